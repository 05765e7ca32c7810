//! MCP transport over HTTP with server-sent events.
//!
//! The client opens a long-lived `GET` event stream. The first `endpoint`
//! event names the URL that JSON-RPC messages are `POST`ed to, and responses
//! come back on the stream as `message` events matched to requests by id.

use super::error::McpError;
use super::sse::{SseDecoder, SseEvent};
use super::types::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

type Pending = DashMap<u64, oneshot::Sender<Result<Value, McpError>>>;

/// HTTP+SSE transport for MCP servers
pub struct SseTransport {
    client: reqwest::Client,
    /// URL announced by the `endpoint` event
    endpoint: Url,
    headers: HeaderMap,
    next_id: AtomicU64,
    /// In-flight requests by JSON-RPC id
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the server's `endpoint` event
    ///
    /// Header values may reference environment variables as `${VAR}`.
    pub async fn connect(url: &str, headers: &HashMap<String, String>) -> Result<Self, McpError> {
        let sse_url = Url::parse(url).map_err(|source| McpError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let headers = build_headers(headers)?;
        let client = reqwest::Client::new();

        tracing::debug!("Opening MCP event stream at {}", sse_url);
        let response = client
            .get(sse_url.clone())
            .headers(headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status { status, body });
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let (endpoint, backlog) = wait_for_endpoint(&mut stream, &mut decoder).await?;

        let endpoint = sse_url
            .join(&endpoint)
            .map_err(|source| McpError::InvalidUrl {
                url: endpoint.clone(),
                source,
            })?;
        if endpoint.origin() != sse_url.origin() {
            return Err(McpError::CrossOrigin(endpoint.to_string()));
        }
        tracing::debug!("MCP message endpoint: {}", endpoint);

        let pending: Arc<Pending> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        for event in &backlog {
            dispatch_event(event, &pending);
        }

        let reader = tokio::spawn(read_events(
            stream,
            decoder,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Ok(Self {
            client,
            endpoint,
            headers,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            reader,
        })
    }

    /// Whether the event stream has ended
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for the matching response on the event stream
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        self.pending.insert(id, tx);
        // Dropped on every exit path, so abandoned requests never linger
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        if self.is_closed() {
            return Err(McpError::StreamClosed);
        }

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        self.post(&request).await?;

        rx.await.unwrap_or(Err(McpError::StreamClosed))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        };
        self.post(&notification).await
    }

    async fn post<T: Serialize>(&self, message: &T) -> Result<(), McpError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("MCP send: {}", serde_json::to_string(message)?);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status { status, body });
        }

        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct PendingGuard<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

async fn wait_for_endpoint<S, B>(
    stream: &mut S,
    decoder: &mut SseDecoder,
) -> Result<(String, Vec<SseEvent>), McpError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut backlog = Vec::new();

    loop {
        let Some(chunk) = stream.next().await else {
            if decoder.finish() {
                tracing::debug!("Discarded unterminated SSE event at end of stream");
            }
            return Err(McpError::NoEndpoint);
        };

        let mut endpoint = None;
        for event in decoder.push(chunk?.as_ref()) {
            if endpoint.is_none() && event.event == "endpoint" {
                endpoint = Some(event.data.trim().to_string());
            } else {
                backlog.push(event);
            }
        }

        if let Some(endpoint) = endpoint {
            return Ok((endpoint, backlog));
        }
    }
}

async fn read_events<S, B>(
    mut stream: S,
    mut decoder: SseDecoder,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
) where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.push(bytes.as_ref()) {
                    dispatch_event(&event, &pending);
                }
            }
            Err(e) => {
                tracing::warn!("MCP event stream error: {}", e);
                break;
            }
        }
    }
    if decoder.finish() {
        tracing::debug!("Discarded unterminated SSE event at end of stream");
    }

    tracing::info!("MCP event stream closed");
    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending);
}

fn fail_pending(pending: &Pending) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(McpError::StreamClosed));
        }
    }
}

fn dispatch_event(event: &SseEvent, pending: &Pending) {
    if event.event != "message" {
        tracing::debug!("Ignoring MCP '{}' event", event.event);
        return;
    }

    let message: JsonRpcMessage = match serde_json::from_str(&event.data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("Dropping malformed MCP message: {} ({})", event.data, e);
            return;
        }
    };

    let Some(id) = message.response_id() else {
        tracing::debug!(
            "Ignoring server-initiated MCP message: {}",
            message.method.as_deref().unwrap_or("(none)")
        );
        return;
    };

    let Some((_, tx)) = pending.remove(&id) else {
        tracing::debug!("No pending MCP request for id {}", id);
        return;
    };

    let outcome = match (message.error, message.result) {
        (Some(error), _) => Err(McpError::Rpc {
            code: error.code,
            message: error.message,
        }),
        (None, Some(result)) => Ok(result),
        (None, None) => Err(McpError::MissingResult),
    };
    let _ = tx.send(outcome);
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, McpError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| McpError::InvalidHeader(key.clone()))?;
        let value = HeaderValue::from_str(&expand_env_vars(value))
            .map_err(|_| McpError::InvalidHeader(key.clone()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Expand environment variable references like ${VAR} in a string
///
/// Unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };

    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
