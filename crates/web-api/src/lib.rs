//! Web API 层
//!
//! 提供 Axum 路由：WebSocket 实时通道和群组管控的 HTTP 接口。

mod app_config;
mod error;
mod routes;
mod state;
mod websocket;

pub use app_config::{AppConfig, DatabaseConfig, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
