use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use domain::DomainError;

        let message = error.to_string();
        match error {
            ApplicationError::NotFriends
            | ApplicationError::NotGroupMember
            | ApplicationError::Muted(_)
            | ApplicationError::PermissionDenied { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
            }
            ApplicationError::NotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            ApplicationError::NotJoined | ApplicationError::InvalidMessage { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
            }
            ApplicationError::Domain(domain_error) => match domain_error {
                DomainError::ValidationError { .. } => {
                    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
                }
                DomainError::ResourceNotFound { .. } => {
                    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
                }
                DomainError::ResourceAlreadyExists { .. } => {
                    ApiError::new(StatusCode::CONFLICT, "ALREADY_EXISTS", message)
                }
                DomainError::PermissionDenied { .. } => {
                    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
                }
                DomainError::BusinessRuleViolation { .. } => {
                    ApiError::new(StatusCode::CONFLICT, "RULE_VIOLATION", message)
                }
                DomainError::Storage { .. } => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
