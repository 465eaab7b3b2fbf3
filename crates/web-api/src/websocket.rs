//! WebSocket 连接处理
//!
//! 每条连接：升级后注册到连接注册表，拆分出发送/接收两个任务。
//! 发送任务把 `ServerEvent` 序列化成 JSON 文本帧；接收任务解析
//! `ClientEvent` 交给分发引擎，解析失败回发 `error` 事件。任一
//! 任务结束即注销连接。

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use application::{ClientEvent, ConnectionId, ServerEvent};

use crate::state::AppState;

pub async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = ConnectionId::new();
    info!(conn_id = %conn_id, "websocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.dispatcher.registry().attach(conn_id, tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(conn_id = %conn_id, error = %e, "failed to serialize event");
                }
            }
        }
        debug!(conn_id = %conn_id, "send task finished");
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => recv_state.dispatcher.handle(conn_id, event).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "unparseable client event");
                        recv_state
                            .dispatcher
                            .registry()
                            .send_to_connection(
                                conn_id,
                                ServerEvent::Error {
                                    message: format!("Unrecognized event: {e}"),
                                },
                            )
                            .await;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(conn_id = %conn_id, error = %e, "websocket read error");
                    break;
                }
            }
        }
        debug!(conn_id = %conn_id, "recv task finished");
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.dispatcher.disconnect(conn_id).await;
}
