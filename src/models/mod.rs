//! Data models
//!
//! This module contains all data structures used throughout the AstroCall
//! backend. Models represent:
//! - Database entities (CallSession, Astrologer, ChatMessage, Review)
//! - API input types

mod astrologer;
mod call_session;
mod chat_message;
mod review;

pub use astrologer::{Astrologer, CreateAstrologerInput};
pub use call_session::{CallSession, CreateSessionInput, SessionStatus};
pub use chat_message::{ChatMessage, CreateChatMessageInput};
pub use review::{CreateReviewInput, Review};
