//! Anchor job records.
//!
//! One record per proof identifier tracks that proof's progress through an
//! external witness provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::ContentId;

/// Lifecycle of an anchor job: `Queued → Posted → {Confirmed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorState {
    Queued,
    Posted,
    Confirmed,
    Failed,
}

impl AnchorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Posted => "POSTED",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for AnchorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "POSTED" => Ok(Self::Posted),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::Decoding(format!("unknown anchor state {:?}", other))),
        }
    }
}

/// Persistent record of one proof's anchoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorJob {
    pub proof_id: ContentId,
    /// Owner the job counts against for quota purposes.
    pub owner: String,
    pub provider: String,
    pub state: AnchorState,
    /// Provider-assigned handle, set once posted.
    pub job_handle: Option<String>,
    pub txid: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl AnchorJob {
    /// A freshly queued job.
    pub fn queued(
        proof_id: ContentId,
        owner: impl Into<String>,
        provider: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            proof_id,
            owner: owner.into(),
            provider: provider.into(),
            state: AnchorState::Queued,
            job_handle: None,
            txid: None,
            queued_at: at,
            posted_at: None,
            confirmed_at: None,
        }
    }

    /// Whether a worker can pick this job up where it left off.
    pub fn resumable_with(&self, provider: &str) -> Option<&str> {
        match (&self.state, &self.job_handle) {
            (AnchorState::Posted, Some(handle)) if self.provider == provider => Some(handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        for state in [
            AnchorState::Queued,
            AnchorState::Posted,
            AnchorState::Confirmed,
            AnchorState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<AnchorState>().unwrap(), state);
            assert_eq!(serde_json::to_string(&state).unwrap(), format!("\"{}\"", state));
        }
        assert!("DONE".parse::<AnchorState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AnchorState::Queued.is_terminal());
        assert!(!AnchorState::Posted.is_terminal());
        assert!(AnchorState::Confirmed.is_terminal());
        assert!(AnchorState::Failed.is_terminal());
    }

    #[test]
    fn test_resumable() {
        let mut job = AnchorJob::queued(ContentId::from_serialized(b"p"), "did:cc:a", "ots", Utc::now());
        assert_eq!(job.resumable_with("ots"), None);

        job.state = AnchorState::Posted;
        job.job_handle = Some("ots:abc".into());
        assert_eq!(job.resumable_with("ots"), Some("ots:abc"));
        assert_eq!(job.resumable_with("evm-l2"), None);
    }
}
