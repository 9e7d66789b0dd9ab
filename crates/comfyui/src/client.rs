//! WebSocket client for the backend's progress channel.
//!
//! [`ComfyUIClient`] holds the connection configuration for one
//! backend instance. Call [`ComfyUIClient::connect`] before submitting
//! a graph: the generated client id must be on the wire first so no
//! completion message is missed.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// The WebSocket stream type used throughout this crate.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a single backend instance.
#[derive(Debug)]
pub struct ComfyUIClient {
    ws_url: String,
}

/// A live progress-channel connection.
pub struct ComfyUIConnection {
    /// Unique client id sent during the handshake. Graph submissions
    /// carrying this id are routed back over this connection.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: WsStream,
}

impl ComfyUIClient {
    /// Create a client targeting `ws_url`, e.g. `ws://127.0.0.1:8188`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the progress channel.
    ///
    /// Generates a UUID v4 client id and appends it as a query
    /// parameter so the backend can address execution messages to this
    /// connection.
    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to backend at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to backend progress channel at {}",
            self.ws_url,
        );

        Ok(ComfyUIConnection {
            client_id,
            ws_stream,
        })
    }
}

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
