use crate::domain::chat::{ChatMessage, ChatThread, MessageDraft, ThreadStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenThreadRequest {
    pub request_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub id: i64,
    pub request_id: i64,
    pub client_id: i64,
    pub admin_id: Option<i64>,
    pub status: ThreadStatus,
    #[serde(with = "time::serde::timestamp")]
    pub opened_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp::option")]
    pub closed_at: Option<OffsetDateTime>,
}

impl From<ChatThread> for ThreadResponse {
    fn from(thread: ChatThread) -> Self {
        Self {
            id: thread.id,
            request_id: thread.request_id,
            client_id: thread.client_id,
            admin_id: thread.admin_id,
            status: thread.status,
            opened_at: thread.opened_at,
            closed_at: thread.closed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub text: Option<String>,
    pub media_path: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<PostMessageRequest> for MessageDraft {
    fn from(req: PostMessageRequest) -> Self {
        Self { text: req.text, media_path: req.media_path, latitude: req.latitude, longitude: req.longitude }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub thread_id: i64,
    pub sender_id: i64,
    pub text: Option<String>,
    pub media_path: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl From<ChatMessage> for MessageResponse {
    fn from(msg: ChatMessage) -> Self {
        Self {
            id: msg.id,
            thread_id: msg.thread_id,
            sender_id: msg.sender_id,
            text: msg.text,
            media_path: msg.media_path,
            latitude: msg.latitude,
            longitude: msg.longitude,
            created_at: msg.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePageQuery {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadResponse {
    pub media_path: String,
}
