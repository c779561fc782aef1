use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

pub const MAX_TEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Closed,
}

impl ThreadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown thread status: {other}")),
        }
    }
}

/// A conversation tied to one service request, between a client and
/// (once one joins) an admin.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatThread {
    pub id: i64,
    pub request_id: i64,
    pub client_id: i64,
    pub admin_id: Option<i64>,
    pub status: ThreadStatus,
    pub opened_at: OffsetDateTime,
    pub closed_at: Option<OffsetDateTime>,
}

impl ChatThread {
    #[must_use]
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.client_id == user_id || self.admin_id == Some(user_id)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ThreadStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub thread_id: i64,
    pub sender_id: i64,
    pub text: Option<String>,
    pub media_path: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ChatMessage {
    #[must_use]
    pub const fn is_redacted(&self) -> bool {
        self.text.is_none() && self.media_path.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}

/// Storage prefix owning every media object of a thread, e.g. `chats/42/`.
#[must_use]
pub fn media_prefix(root: &str, thread_id: i64) -> String {
    format!("{}/{thread_id}/", root.trim_end_matches('/'))
}

/// Content of a message before it is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    pub text: Option<String>,
    pub media_path: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl MessageDraft {
    /// Checks that the draft carries content and that every field is well formed.
    ///
    /// # Errors
    /// Returns a human readable reason when the draft is rejected.
    pub fn validate(&self, prefix: &str) -> Result<(), String> {
        let text = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let has_location = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err("Location is out of range".into());
                }
                true
            }
            (None, None) => false,
            _ => return Err("Latitude and longitude must be provided together".into()),
        };

        if text.is_none() && self.media_path.is_none() && !has_location {
            return Err("Message must contain text, media or a location".into());
        }

        if let Some(text) = text
            && text.chars().count() > MAX_TEXT_CHARS
        {
            return Err(format!("Text exceeds {MAX_TEXT_CHARS} characters"));
        }

        if let Some(path) = &self.media_path
            && (!path.starts_with(prefix) || path.len() == prefix.len() || path.contains(".."))
        {
            return Err("Media does not belong to this thread".into());
        }

        Ok(())
    }
}
