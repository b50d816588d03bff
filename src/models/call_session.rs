//! Call session model

use serde::{Deserialize, Serialize};

/// Lifecycle state of a consultation call.
///
/// `Ended` and `Declined` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Ended,
    Declined,
}

impl SessionStatus {
    /// Whether no further transition is permitted out of this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Declined)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Ended => write!(f, "ended"),
            Self::Declined => write!(f, "declined"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            "declined" => Ok(Self::Declined),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// One consultation call between a user and an astrologer.
///
/// Participants and `room_name` are fixed at creation. Timestamps are epoch
/// milliseconds; `started_at` is set on accept, `ended_at` and
/// `duration_seconds` on end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub astro_id: String,
    pub astro_name: String,
    pub status: SessionStatus,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_seconds: i64,
    pub room_name: String,
    pub created_at: i64,
}

impl CallSession {
    /// Whether `identity` is one of the two participants.
    pub fn is_participant(&self, identity: &str) -> bool {
        identity == self.user_id || identity == self.astro_id
    }
}

/// Input for creating a call session
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionInput {
    pub user_id: String,
    pub user_name: String,
    pub astro_id: String,
    pub astro_name: String,
}
