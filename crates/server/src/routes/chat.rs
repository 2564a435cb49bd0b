//! Chat route handlers: session resolution, message submission, and the
//! token stream.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Sse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use shopmate_core::SessionKey;

use crate::error::Result;
use crate::middleware::Identity;
use crate::models::{ChatMessage, ChatSession};
use crate::services::broker::StreamItem;
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/sessions", get(resolve_session))
        .route("/chat/sessions/{key}", get(get_session))
        .route("/chat/message", post(send_message))
        .route("/chat/stream", get(stream_tokens))
}

/// Wire shape for a chat session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: SessionKey,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ChatSession> for SessionView {
    fn from(session: ChatSession) -> Self {
        Self {
            session_id: session.key,
            messages: session.messages,
            expiry_date: session.expiry_date,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Resolve the caller's session, minting one when they have none.
async fn resolve_session(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<SessionView>> {
    let session = state
        .chat()
        .resolve_or_create(identity.user.as_ref(), identity.session.as_ref())
        .await?;
    Ok(Json(session.into()))
}

/// Fetch a session by its key.
async fn get_session(
    State(state): State<AppState>,
    identity: Identity,
    Path(key): Path<SessionKey>,
) -> Result<Json<SessionView>> {
    let session = state.chat().get_session(&key, identity.user.as_ref()).await?;
    Ok(Json(session.into()))
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    session_id: SessionKey,
    content: String,
}

/// Accept a user message; the response streams separately.
async fn send_message(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<SendMessageRequest>,
) -> Result<StatusCode> {
    if body.content.trim().is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "message content must not be empty".to_string(),
        ));
    }
    state
        .chat()
        .submit_message(&body.session_id, identity.user.as_ref(), body.content)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    session_id: SessionKey,
}

/// Stream assistant tokens for a session over SSE.
///
/// The first event confirms the connection; each token event carries
/// `{token, session_id, finished}` and a turn closes with either a
/// `finished: true` event or an `error` event. The stream itself stays
/// open across turns and is torn down only by client disconnect or the
/// inactivity timeout.
async fn stream_tokens(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>>> {
    // Session must resolve before the channel opens.
    let session = state
        .chat()
        .get_session(&query.session_id, identity.user.as_ref())
        .await?;

    let key = session.key;
    let timeout = Duration::from_secs(state.config().stream_timeout_secs);
    let mut handle = state.chat().broker().open(&key);

    let sse_stream = stream! {
        yield Ok(Event::default()
            .event("connection")
            .data(json!({ "session_id": key }).to_string()));

        loop {
            match handle.recv_timeout(timeout).await {
                Ok(Some(StreamItem::Token(token))) => {
                    yield Ok(Event::default().data(
                        json!({
                            "token": token,
                            "session_id": key,
                            "finished": false,
                        })
                        .to_string(),
                    ));
                }
                Ok(Some(StreamItem::Done)) => {
                    yield Ok(Event::default().data(
                        json!({
                            "token": "",
                            "session_id": key,
                            "finished": true,
                        })
                        .to_string(),
                    ));
                }
                Ok(Some(StreamItem::Error(message))) => {
                    yield Ok(Event::default()
                        .event("error")
                        .data(json!({ "error": message, "session_id": key }).to_string()));
                }
                // Producer side gone with the channel drained.
                Ok(None) => break,
                Err(_) => {
                    yield Ok(Event::default()
                        .event("error")
                        .data(json!({ "error": "stream timed out", "session_id": key }).to_string()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
