//! Chat message model

use serde::{Deserialize, Serialize};

/// In-call chat message, subordinate to a session.
///
/// Append-only: there are no edit or delete semantics. Ordering within a
/// session follows the non-decreasing `created_at` (epoch ms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub created_at: i64,
}

/// Input for posting a chat message
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatMessageInput {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
}
