use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    CloseChatAndPurgeMedia { thread_id: i64 },
}

impl JobPayload {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CloseChatAndPurgeMedia { .. } => "close_chat_and_purge_media",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub payload: JobPayload,
    /// Number of attempts that have already failed.
    pub attempts: u32,
    pub queued_at: OffsetDateTime,
}

impl Job {
    #[must_use]
    pub fn new(payload: JobPayload) -> Self {
        Self { id: Uuid::now_v7(), payload, attempts: 0, queued_at: OffsetDateTime::now_utc() }
    }

    #[must_use]
    pub fn with_failed_attempt(&self) -> Self {
        Self { attempts: self.attempts.saturating_add(1), ..self.clone() }
    }
}

/// A job that exhausted its attempts, kept for operator inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub job: Job,
    pub error: String,
    pub failed_at: OffsetDateTime,
}

/// Maximum attempt count plus the ordered delays applied between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new([5, 30, 60, 120, 300].map(Duration::from_secs).to_vec(), 5)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(delays: Vec<Duration>, max_attempts: u32) -> Self {
        Self { delays, max_attempts: max_attempts.max(1) }
    }

    #[must_use]
    pub fn from_secs(delays: &[u64], max_attempts: u32) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_secs).collect(), max_attempts)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt once `failed_attempts` attempts have failed,
    /// or `None` when the job has used up its attempts.
    ///
    /// The n-th failure waits for the n-th delay; failures beyond the list reuse its last entry.
    #[must_use]
    pub fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let index = usize::try_from(failed_attempts - 1).unwrap_or(usize::MAX).min(self.delays.len().saturating_sub(1));
        Some(self.delays.get(index).copied().unwrap_or(Duration::ZERO))
    }
}
