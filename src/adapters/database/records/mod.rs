pub mod chat;

pub use chat::{ChatMessageRecord, ChatThreadRecord};
