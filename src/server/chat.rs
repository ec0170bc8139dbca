//! Chat endpoints: send a message, read a session's history.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{CompletionRequest, Message, Role};
use crate::error::{FolioError, Result};
use crate::server::AppState;
use crate::store::StoredMessage;

const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for HistoryEntry {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/message", post(send_message))
        .route("/history/{session_id}", get(history))
}

impl ChatMessage {
    fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(FolioError::Validation("session_id is required".to_string()));
        }
        let len = self.message.chars().count();
        if len == 0 || len > MAX_MESSAGE_CHARS {
            return Err(FolioError::Validation(format!(
                "message must be 1-{} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(())
    }
}

/// System prompt followed by the stored history
fn build_context(system_prompt: &str, history: Vec<StoredMessage>) -> Vec<Message> {
    std::iter::once(Message::system(system_prompt))
        .chain(history.into_iter().map(|m| Message::new(m.role, m.content)))
        .collect()
}

async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<ChatMessage>,
) -> Result<Json<ChatResponse>> {
    body.validate()?;
    let ai = &state.settings.ai;

    let conversation_id = state
        .store
        .get_or_create_conversation(&body.session_id)
        .await?;
    state
        .store
        .append_message(conversation_id, Role::User, &body.message)
        .await?;

    let history = state
        .store
        .recent_messages(conversation_id, ai.history_limit)
        .await?;

    let request = CompletionRequest::new(ai.model.clone(), build_context(&ai.system_prompt, history))
        .with_temperature(ai.temperature)
        .with_max_tokens(ai.max_tokens);

    let outcome = state.dispatcher.dispatch(&request).await;
    tracing::debug!(
        %conversation_id,
        attempts = outcome.attempts(),
        success = outcome.is_success(),
        "completion dispatched"
    );
    let reply = outcome.into_result()?;

    let stored = state
        .store
        .append_message(conversation_id, Role::Assistant, &reply)
        .await?;

    Ok(Json(ChatResponse {
        message: reply,
        conversation_id: conversation_id.to_string(),
        created_at: stored.created_at,
    }))
}

async fn history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>> {
    let Some(conversation_id) = state.store.find_conversation(&session_id).await? else {
        return Ok(Json(Vec::new()));
    };

    let messages = state.store.messages(conversation_id).await?;
    Ok(Json(messages.into_iter().map(HistoryEntry::from).collect()))
}
