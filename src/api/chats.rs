use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::chat::{
    MediaUploadResponse, MessagePageQuery, MessageResponse, OpenThreadRequest, PostMessageRequest, ThreadResponse,
};
use crate::error::Result;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

/// Opens a chat for a service request (201), or returns the request's open chat (200).
///
/// # Errors
/// Returns `AppError::Forbidden` when chat is disabled or an admin tries to start a chat.
pub async fn open_thread(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<OpenThreadRequest>,
) -> Result<impl IntoResponse> {
    let (thread, created) = state.chat_service.open_thread(actor, payload.request_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ThreadResponse::from(thread))))
}

/// # Errors
/// Returns `AppError::NotFound` or `AppError::Forbidden`.
pub async fn get_thread(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let thread = state.chat_service.get_thread(actor, thread_id).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

/// # Errors
/// Returns `AppError::Forbidden` for non-admins and `AppError::Conflict` when the chat cannot be joined.
pub async fn join_thread(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let thread = state.chat_service.join_thread(actor, thread_id).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

/// Closes a chat; media purge runs asynchronously afterwards.
///
/// # Errors
/// Returns `AppError::NotFound` or `AppError::Forbidden`.
pub async fn close_thread(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let thread = state.chat_service.close_thread(actor, thread_id).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

/// # Errors
/// Returns `AppError::NotFound` or `AppError::Forbidden`.
pub async fn list_messages(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Query(page): Query<MessagePageQuery>,
) -> Result<impl IntoResponse> {
    let messages = state.chat_service.list_messages(actor, thread_id, page.before, page.limit).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect::<Vec<_>>()))
}

/// # Errors
/// Returns `AppError::BadRequest` for invalid content, `AppError::Forbidden` on closed chats.
pub async fn post_message(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.chat_service.post_message(actor, thread_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Uploads a raw media body into the chat's storage prefix.
///
/// # Errors
/// Returns `AppError::PayloadTooLarge`, `AppError::Forbidden`, or `AppError::Storage`.
pub async fn upload_media(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(ToString::to_string);
    let media_path = state.chat_service.upload_media(actor, thread_id, body, content_type).await?;
    Ok((StatusCode::CREATED, Json(MediaUploadResponse { media_path })))
}
