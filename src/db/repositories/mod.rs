//! Repository layer
//!
//! Trait-based data access for each entity, with SQLx implementations
//! covering both SQLite and MySQL.

pub mod astrologer;
pub mod call_session;
pub mod chat_message;
pub mod review;

pub use astrologer::{AstrologerRepository, SqlxAstrologerRepository};
pub use call_session::{CallSessionRepository, SqlxCallSessionRepository};
pub use chat_message::{ChatMessageRepository, SqlxChatMessageRepository};
pub use review::{is_transient_conflict, ReviewRepository, SqlxReviewRepository};
