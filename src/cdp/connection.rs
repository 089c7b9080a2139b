//! CDP WebSocket connection implementation
//!
//! One WebSocket per session. The socket is split on connect: a spawned
//! reader task owns the receiving half and completes pending commands, the
//! sending half lives behind a mutex. Closing the connection fails every
//! pending command, so a poll blocked on `send_command` observes an error
//! instead of hanging.

use super::traits::{CdpConnection, CdpError, CdpResponse};
use super::types::{CdpNotification, CdpRequest, CdpRpcResponse};
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Per-command reply budgets (seconds)
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const SCREENSHOT_COMMAND_TIMEOUT_SECS: u64 = 90;

fn timeout_for(method: &str) -> tokio::time::Duration {
    let secs = if method.to_lowercase().contains("screenshot") {
        SCREENSHOT_COMMAND_TIMEOUT_SECS
    } else {
        DEFAULT_COMMAND_TIMEOUT_SECS
    };
    tokio::time::Duration::from_secs(secs)
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Sending half of the socket
    sink: Arc<Mutex<WsSink>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending: Arc<Mutex<HashMap<u64, PendingCommand>>>,
    /// Is connection active
    is_active: Arc<AtomicBool>,
}

impl CdpWebSocketConnection {
    /// Connect to a CDP WebSocket endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn connect<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to CDP WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;

        let (sink, stream) = ws_stream.split();

        let connection = Arc::new(Self {
            url,
            sink: Arc::new(Mutex::new(sink)),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            is_active: Arc::new(AtomicBool::new(true)),
        });

        tokio::spawn(Self::read_loop(
            stream,
            Arc::clone(&connection.sink),
            Arc::clone(&connection.pending),
            Arc::clone(&connection.is_active),
        ));

        Ok(connection)
    }

    /// WebSocket URL this connection was established against
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reader task: completes pending commands, answers pings, and tears the
    /// connection down when the socket closes.
    async fn read_loop(
        mut stream: WsStream,
        sink: Arc<Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingCommand>>>,
        is_active: Arc<AtomicBool>,
    ) {
        debug!("CDP read loop started");

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    Self::dispatch_message(&text, &pending).await;
                }
                Ok(Message::Ping(data)) => {
                    let mut sink = sink.lock().await;
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }

        is_active.store(false, Ordering::SeqCst);
        Self::fail_pending(&pending, "connection closed").await;
        debug!("CDP read loop exited");
    }

    /// Route an incoming frame to the matching pending command, or log it as
    /// an event notification.
    async fn dispatch_message(text: &str, pending: &Arc<Mutex<HashMap<u64, PendingCommand>>>) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            let mut pending = pending.lock().await;
            if let Some(cmd) = pending.remove(&response.id) {
                debug!("Response for command {} ({})", response.id, cmd.method);
                let _ = cmd.sender.send(CdpResponse {
                    id: response.id,
                    result: Some(response.result),
                    error: response.error.map(|e| CdpError {
                        code: e.code,
                        message: e.message,
                        data: e.data,
                    }),
                });
            } else {
                warn!("Response for unknown command ID: {}", response.id);
            }
            return;
        }

        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            debug!("CDP event: {}", notification.method);
            return;
        }

        warn!("Unknown message format: {}", text);
    }

    /// Fail every pending command with a closed-connection error.
    async fn fail_pending(pending: &Arc<Mutex<HashMap<u64, PendingCommand>>>, reason: &str) {
        let mut pending = pending.lock().await;
        for (id, cmd) in pending.drain() {
            debug!("Failing pending command {} ({}): {}", id, cmd.method, reason);
            let _ = cmd.sender.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpError {
                    code: -1,
                    message: reason.to_string(),
                    data: None,
                }),
            });
        }
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::cdp(format!("Failed to serialize request: {}", e)))?;

        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id,
                PendingCommand {
                    sender,
                    method: method.to_string(),
                },
            );
        }

        debug!("Sending CDP command {}: {}", id, method);
        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Text(json)).await {
                self.pending.lock().await.remove(&id);
                return Err(Error::websocket(format!("Failed to send command: {}", e)));
            }
        }

        match tokio::time::timeout(timeout_for(method), receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = &response.error {
                    return Err(Error::cdp(format!(
                        "{} failed: {} (code {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Command {} reply channel closed",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::cdp(format!("Command {} timed out", method)))
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection");

        self.is_active.store(false, Ordering::SeqCst);
        Self::fail_pending(&self.pending, "connection closing").await;

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            // Socket may already be gone; closing is best-effort.
            debug!("Close frame not delivered: {}", e);
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_for_screenshot_commands() {
        assert_eq!(
            timeout_for("Page.captureScreenshot"),
            tokio::time::Duration::from_secs(SCREENSHOT_COMMAND_TIMEOUT_SECS)
        );
        assert_eq!(
            timeout_for("Runtime.evaluate"),
            tokio::time::Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_fail_pending_drains_all() {
        let pending: Arc<Mutex<HashMap<u64, PendingCommand>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let (sender, receiver) = oneshot::channel();
        pending.lock().await.insert(
            7,
            PendingCommand {
                sender,
                method: "Runtime.evaluate".to_string(),
            },
        );

        CdpWebSocketConnection::fail_pending(&pending, "connection closed").await;

        assert!(pending.lock().await.is_empty());
        let response = receiver.await.unwrap();
        assert_eq!(response.error.unwrap().message, "connection closed");
    }
}
