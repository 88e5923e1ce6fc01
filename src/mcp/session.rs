//! One handshake-initialized SSE transport session to an MCP endpoint.
//!
//! A session opens `GET {endpoint}/sse`, reads the `endpoint` event naming
//! the message-POST URL, then keeps the stream open on a background reader
//! task that routes JSON-RPC responses back to in-flight calls by request id.
//! When the stream drops, the session flags itself closed and every pending
//! or later call fails with [`McpError::TransportClosed`] so callers can
//! decide to reconnect.

use super::error::McpError;
use super::protocol;
use super::transport::{
    is_event_stream_content_type, resolve_message_url, sse_stream_url, SseEventParser,
    SseLineBuffer,
};
use crate::core::config::McpEndpointConfig;
use futures_util::{Stream, StreamExt};
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeResult, RequestId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;
const HTTP_POST_TIMEOUT_SECONDS: u64 = 60;
const JSON_CONTENT_TYPE: &str = "application/json";
const JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
const SSE_ENDPOINT_EVENT: &str = "endpoint";
const SSE_MESSAGE_EVENT: &str = "message";

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>;

fn build_http_client(connect_timeout: Duration) -> Result<reqwest::Client, McpError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|err| McpError::Transport(format!("failed to build HTTP client: {err}")))
}

#[derive(Debug)]
pub struct McpSession {
    endpoint: String,
    correlation_id: String,
    message_url: String,
    http: reqwest::Client,
    pending: PendingMap,
    next_request_id: AtomicI64,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    initialized: AtomicBool,
    call_timeout: Duration,
}

impl McpSession {
    /// Open a session to `config.host` and run the protocol handshake.
    ///
    /// The entire connect + endpoint-event + initialize sequence is bounded
    /// by the endpoint's connect timeout; exceeding it yields
    /// [`McpError::ConnectTimeout`]. Lower-level faults yield
    /// [`McpError::Transport`].
    pub async fn connect(
        config: &McpEndpointConfig,
        call_timeout: Duration,
        correlation_id: &str,
    ) -> Result<McpSession, McpError> {
        let timeout = config.connect_timeout();
        info!(
            correlation_id = %correlation_id,
            endpoint = %config.host,
            "mcp_connection_initiated"
        );
        match tokio::time::timeout(timeout, Self::establish(config, call_timeout, correlation_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(McpError::ConnectTimeout {
                endpoint: config.host.clone(),
                timeout,
            }),
        }
    }

    async fn establish(
        config: &McpEndpointConfig,
        call_timeout: Duration,
        correlation_id: &str,
    ) -> Result<McpSession, McpError> {
        let http = build_http_client(config.connect_timeout())?;
        let stream_url = sse_stream_url(&config.host);

        let response = http
            .get(&stream_url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|err| McpError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(McpError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !is_event_stream_content_type(content_type) {
            return Err(McpError::Transport(format!(
                "unexpected content type: {content_type:?}"
            )));
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut lines = SseLineBuffer::default();
        let mut events = SseEventParser::default();

        let announced = loop {
            let Some(chunk) = stream.next().await else {
                return Err(McpError::Transport(
                    "stream ended before endpoint event".to_string(),
                ));
            };
            let chunk = chunk.map_err(|err| McpError::Transport(err.to_string()))?;
            let mut found = None;
            for line in lines.push(&chunk) {
                if let Some(event) = events.feed(&line) {
                    if event.name == SSE_ENDPOINT_EVENT {
                        found = Some(event.data);
                        break;
                    }
                }
            }
            if let Some(announced) = found {
                break announced;
            }
        };
        let message_url = resolve_message_url(&stream_url, &announced);
        debug!(
            correlation_id = %correlation_id,
            endpoint = %config.host,
            message_url = %message_url,
            "Resolved MCP message channel"
        );

        let session = McpSession {
            endpoint: config.host.clone(),
            correlation_id: correlation_id.to_string(),
            message_url,
            http,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicI64::new(0),
            closed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            initialized: AtomicBool::new(false),
            call_timeout,
        };

        tokio::spawn(read_loop(
            stream,
            lines,
            events,
            Arc::clone(&session.pending),
            Arc::clone(&session.closed),
            session.cancel.clone(),
        ));

        let details = match session.handshake().await {
            Ok(details) => details,
            Err(err) => {
                session.close().await;
                return Err(err);
            }
        };
        session.initialized.store(true, Ordering::SeqCst);
        info!(
            correlation_id = %correlation_id,
            endpoint = %config.host,
            server = %details.server_info.name,
            protocol_version = %details.protocol_version,
            "mcp_session_initialized"
        );
        Ok(session)
    }

    async fn handshake(&self) -> Result<InitializeResult, McpError> {
        let response = self
            .request_raw(
                RequestFromClient::InitializeRequest(protocol::client_details()),
                None,
            )
            .await?;
        let details = protocol::parse_initialize_result(response)?;

        let notification = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(
                NotificationFromClient::InitializedNotification(None),
            ),
            None,
        )
        .map_err(|err| McpError::Transport(err.to_string()))?;
        self.post_message(&notification).await?;
        Ok(details)
    }

    /// Send one JSON-RPC request and await its routed response, bounded by
    /// the configured per-call timeout.
    pub async fn request(&self, request: RequestFromClient) -> Result<ServerMessage, McpError> {
        self.request_raw(request, Some(self.call_timeout)).await
    }

    async fn request_raw(
        &self,
        request: RequestFromClient,
        timeout: Option<Duration>,
    ) -> Result<ServerMessage, McpError> {
        if self.is_closed() {
            return Err(McpError::TransportClosed);
        }

        let request_id = RequestId::Integer(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| McpError::Transport(err.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(err) = self.post_message(&message).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        let response = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(response) => response,
                Err(_) => {
                    self.pending.lock().await.remove(&request_id);
                    return Err(McpError::Transport(format!(
                        "call timed out after {limit:?}"
                    )));
                }
            },
            None => rx.await,
        };

        // The sender is dropped when the reader task drains pending calls on
        // stream teardown.
        response.map_err(|_| McpError::TransportClosed)
    }

    async fn post_message(&self, message: &ClientMessage) -> Result<(), McpError> {
        let payload = serde_json::to_string(message)
            .map_err(|err| McpError::Transport(err.to_string()))?;
        let response = self
            .http
            .post(&self.message_url)
            .header("Content-Type", JSON_CONTENT_TYPE)
            .header("Accept", JSON_AND_SSE_ACCEPT)
            .timeout(Duration::from_secs(HTTP_POST_TIMEOUT_SECONDS))
            .body(payload)
            .send()
            .await
            .map_err(|err| {
                if self.is_closed() {
                    McpError::TransportClosed
                } else {
                    McpError::Transport(err.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(McpError::Transport(format!(
                "HTTP error: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Close the session. Idempotent; never fails.
    pub async fn close(&self) {
        self.cancel.cancel();
        let already_closed = self.closed.swap(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
        if !already_closed {
            info!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                "mcp_session_closed"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        // The reader task must not outlive its session, whatever the exit
        // path was.
        self.cancel.cancel();
    }
}

async fn read_loop<S, B, E>(
    mut stream: S,
    mut lines: SseLineBuffer,
    mut events: SseEventParser,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = stream.next() => {
                let Some(Ok(chunk)) = chunk else { break };
                for line in lines.push(chunk.as_ref()) {
                    if let Some(event) = events.feed(&line) {
                        if event.name == SSE_MESSAGE_EVENT {
                            route_message(&pending, &event.data).await;
                        }
                    }
                }
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every in-flight call with TransportClosed.
    pending.lock().await.clear();
}

async fn route_message(pending: &PendingMap, payload: &str) {
    let message = match serde_json::from_str::<ServerMessage>(payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "Discarding undecodable MCP server message");
            return;
        }
    };
    let request_id = match &message {
        ServerMessage::Response(response) => Some(response.id.clone()),
        ServerMessage::Error(error) => error.id.clone(),
        _ => None,
    };
    let Some(request_id) = request_id else {
        return;
    };
    if let Some(tx) = pending.lock().await.remove(&request_id) {
        let _ = tx.send(message);
    }
}
