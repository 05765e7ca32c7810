//! HTTP chat API
//!
//! Each conversation is a server-side [`ChatSession`] keyed by id. Turns
//! within one session are serialized; separate sessions run independently.
//! A session ends on `DELETE` or after `server.session_idle_secs` without
//! activity, which also closes its MCP connection.

use crate::session::{ChatMessage, ChatSession, CollectingSink, SessionInitializer};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state
struct AppState {
    initializer: SessionInitializer,
    sessions: SessionStore,
}

/// A live session and when it was last used
struct SessionSlot {
    session: Mutex<ChatSession>,
    last_active: std::sync::Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: ChatSession) -> Self {
        Self {
            session: Mutex::new(session),
            last_active: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// A turn is running
    fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }
}

/// Sessions by id
#[derive(Default)]
struct SessionStore {
    sessions: DashMap<String, Arc<SessionSlot>>,
}

impl SessionStore {
    fn insert(&self, session: ChatSession) -> String {
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), Arc::new(SessionSlot::new(session)));
        id
    }

    /// Clone the slot out so the map shard is not held across awaits
    fn get(&self, id: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle for at least `max_idle`; returns how many went
    ///
    /// A session in the middle of a turn is never dropped.
    fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, slot| slot.is_busy() || slot.idle_for() < max_idle);
        before.saturating_sub(self.sessions.len())
    }
}

/// Periodically end idle sessions until the router is dropped
fn spawn_idle_sweeper(state: Weak<AppState>, max_idle: Duration) {
    let period = max_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            let evicted = state.sessions.evict_idle(max_idle);
            if evicted > 0 {
                tracing::info!("Ended {} idle session(s)", evicted);
            }
        }
    });
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
}

#[derive(Debug, Serialize)]
struct SessionCreatedResponse {
    session_id: String,
    tools: Vec<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct SessionInfoResponse {
    session_id: String,
    created_at: DateTime<Utc>,
    tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

/// Build the API router
///
/// Must be called inside a Tokio runtime: it starts the idle-session sweeper.
pub fn router(initializer: SessionInitializer) -> Router {
    let idle_secs = initializer.config().server.session_idle_secs;
    let state = Arc::new(AppState {
        initializer,
        sessions: SessionStore::default(),
    });

    if idle_secs > 0 {
        spawn_idle_sweeper(Arc::downgrade(&state), Duration::from_secs(idle_secs));
    }

    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/messages", post(post_message))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server until the process is stopped
pub async fn run_http_server(host: &str, port: u16, initializer: SessionInitializer) -> Result<()> {
    let app = router(initializer);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len(),
    })
}

async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.initializer.start().await {
        Ok(session) => {
            let tools = session.tool_names().to_vec();
            let session_id = state.sessions.insert(session);

            (
                StatusCode::CREATED,
                Json(SessionCreatedResponse {
                    session_id,
                    tools,
                    messages: vec![ChatMessage::ready()],
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Session setup failed: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "messages": [ChatMessage::setup_error(&e)],
                })),
            )
                .into_response()
        }
    }
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(slot) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    slot.touch();
    let session = slot.session.lock().await;

    (
        StatusCode::OK,
        Json(SessionInfoResponse {
            session_id: session.id().to_string(),
            created_at: session.created_at(),
            tools: session.tool_names().to_vec(),
        }),
    )
        .into_response()
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    let Some(slot) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let text = req.message.trim();
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "message must not be empty" })),
        )
            .into_response();
    }

    // One turn at a time per session
    let session = slot.session.lock().await;
    slot.touch();
    let sink = CollectingSink::new();
    session.handle_message(text, &sink).await;
    slot.touch();

    (
        StatusCode::OK,
        Json(MessageResponse {
            session_id: id,
            messages: sink.take(),
        }),
    )
        .into_response()
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.sessions.remove(&id) {
        tracing::info!(session = %id, "Session ended");
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(&id)
    }
}

fn session_not_found(id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("Unknown session: {}", id) })),
    )
        .into_response()
}
