use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use domain::{
    DirectMessage, Group, GroupId, GroupMessage, GroupRole, Notification, NotificationId, UserId,
};

use crate::{error::ApiError, state::AppState, websocket};

#[derive(Debug, Deserialize)]
struct ModerationPayload {
    target_id: Uuid,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutePayload {
    target_id: Uuid,
    duration_minutes: Option<i64>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    target_id: Uuid,
    role: GroupRole,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// 从 X-User-Id 请求头解析操作者身份
fn actor_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing X-User-Id header"))?;
    let id = Uuid::parse_str(raw).map_err(|_| ApiError::unauthorized("invalid X-User-Id header"))?;
    Ok(UserId::new(id))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket::handle_upgrade))
        .route("/api/groups/{id}/ban", post(ban_member))
        .route("/api/groups/{id}/unban", post(unban_member))
        .route("/api/groups/{id}/mute", post(mute_member))
        .route("/api/groups/{id}/unmute", post(unmute_member))
        .route("/api/groups/{id}/kick", post(kick_member))
        .route("/api/groups/{id}/role", post(change_role))
        .route("/api/groups/{id}/messages", get(group_messages))
        .route("/api/messages/{peer_id}", get(conversation))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread_count", get(unread_count))
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn ban_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ModerationPayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .ban(
            GroupId::new(id),
            actor,
            UserId::new(payload.target_id),
            payload.reason,
        )
        .await?;
    Ok(Json(group))
}

async fn unban_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ModerationPayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .unban(GroupId::new(id), actor, UserId::new(payload.target_id))
        .await?;
    Ok(Json(group))
}

async fn mute_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<MutePayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .mute(
            GroupId::new(id),
            actor,
            UserId::new(payload.target_id),
            payload.duration_minutes,
            payload.reason,
        )
        .await?;
    Ok(Json(group))
}

async fn unmute_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ModerationPayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .unmute(GroupId::new(id), actor, UserId::new(payload.target_id))
        .await?;
    Ok(Json(group))
}

async fn kick_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ModerationPayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .kick(GroupId::new(id), actor, UserId::new(payload.target_id))
        .await?;
    Ok(Json(group))
}

async fn change_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<RolePayload>,
) -> Result<Json<Group>, ApiError> {
    let actor = actor_id(&headers)?;
    let group = state
        .moderation
        .change_role(
            GroupId::new(id),
            actor,
            UserId::new(payload.target_id),
            payload.role,
        )
        .await?;
    Ok(Json(group))
}

async fn group_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GroupMessage>>, ApiError> {
    let actor = actor_id(&headers)?;
    let messages = state
        .history
        .group_history(GroupId::new(id), actor, query.limit)
        .await?;
    Ok(Json(messages))
}

async fn conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DirectMessage>>, ApiError> {
    let actor = actor_id(&headers)?;
    let messages = state
        .history
        .conversation(actor, UserId::new(peer_id), query.limit)
        .await?;
    Ok(Json(messages))
}

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let user = actor_id(&headers)?;
    let notifications = state
        .notifications
        .find_by_user(user, query.limit)
        .await
        .map_err(|e| ApiError::from(application::ApplicationError::Domain(e)))?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>, ApiError> {
    let user = actor_id(&headers)?;
    let count = state
        .notifications
        .count_unread(user)
        .await
        .map_err(|e| ApiError::from(application::ApplicationError::Domain(e)))?;
    Ok(Json(json!({ "count": count })))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>, ApiError> {
    actor_id(&headers)?;
    state
        .notifications
        .mark_as_read(NotificationId::new(id))
        .await
        .map_err(|e| ApiError::from(application::ApplicationError::Domain(e)))?;
    Ok(Json(json!({ "ok": true })))
}
