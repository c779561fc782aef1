use crate::api::MgmtState;
use crate::config::ChatFlags;
use axum::{Json, extract::State, response::IntoResponse};

pub async fn get_flags(State(state): State<MgmtState>) -> impl IntoResponse {
    Json(*state.flags.borrow())
}

/// Replaces the runtime chat flags; workers and requests pick them up on their next read.
pub async fn put_flags(State(state): State<MgmtState>, Json(flags): Json<ChatFlags>) -> impl IntoResponse {
    let previous = state.flags.send_replace(flags);
    tracing::info!(?previous, current = ?flags, "Chat flags updated");
    Json(flags)
}
