use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use kopi_core::domain::session::ThreadId;
use kopi_core::domain::slots::Slots;
use kopi_core::domain::turn::{Intent, ToolName};
use kopi_core::errors::InterfaceError;

use super::{api_error, ApiError, ApiState};

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub intent: Option<Intent>,
    pub tool: Option<ToolName>,
    pub error: Option<String>,
    pub slots: Slots,
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let thread_id = ThreadId(body.session_id);

    let outcome = state
        .runtime
        .handle_message(&thread_id, &body.message, &correlation_id)
        .await
        .map_err(|application_error| {
            let interface = application_error.into_interface(correlation_id.as_str());
            warn!(
                event_name = "chat.turn.rejected",
                correlation_id = %interface.correlation_id(),
                thread_id = %thread_id.as_str(),
                error = %interface,
                "chat turn rejected"
            );
            interface_error(&interface)
        })?;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
        intent: Some(outcome.intent),
        tool: outcome.tool,
        error: outcome.error,
        slots: outcome.slots,
    }))
}

fn interface_error(error: &InterfaceError) -> ApiError {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let detail = match error {
        InterfaceError::Internal { .. } => error.user_message().to_string(),
        _ => error.message().to_string(),
    };
    api_error(status, detail)
}
