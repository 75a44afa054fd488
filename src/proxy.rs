//! HTTP handlers forwarding to the generative model.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::AppError;
use crate::llm::{
    CHAT_SYSTEM_PROMPT, ChatTurn, GENERATE_SYSTEM_PROMPT, GeneratedBit, GenerativeModel, LlmError,
    bit_prompt, bit_schema, chat_message,
};

pub const CHAT_FAILURE_TEXT: &str = "Connection interrupted. The vibes are off.";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Title of the lesson the user is looking at
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
}

fn model(state: &AppState) -> Result<Arc<dyn GenerativeModel>, AppError> {
    state.model.clone().ok_or(AppError::LlmUnconfigured)
}

/// Drafts a bit about the requested topic.
pub async fn handle_generate_bit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GeneratedBit>, AppError> {
    let model = model(&state)?;

    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(AppError::BadRequest("Topic is required".to_string()));
    }

    let generated = model
        .generate_json(GENERATE_SYSTEM_PROMPT, &bit_prompt(topic), Some(bit_schema()))
        .await
        .and_then(|value| {
            serde_json::from_value::<GeneratedBit>(value)
                .map_err(|e| LlmError::Malformed(e.to_string()))
        })
        .map_err(|e| {
            log::warn!("Generation error for {topic:?}: {e}");
            AppError::Generation(e)
        })?;

    Ok(Json(generated))
}

/// One chat exchange. Provider failures still answer with a `text` body the
/// chat window can show.
pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let model = model(&state)?;

    if request.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }

    let message = chat_message(&request.message, request.context.as_deref());
    match model
        .chat(CHAT_SYSTEM_PROMPT, &request.history, &message)
        .await
    {
        Ok(text) => Ok(Json(ChatReply { text }).into_response()),
        Err(e) => {
            log::warn!("Chat error: {e}");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatReply {
                    text: CHAT_FAILURE_TEXT.to_string(),
                }),
            )
                .into_response())
        }
    }
}
