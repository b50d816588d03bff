//! Business logic layer
//!
//! Each service owns one concern, takes its repositories as trait objects,
//! and exposes a `thiserror` error enum that the API layer maps to HTTP.

pub mod astrologer;
pub mod chat;
#[cfg(feature = "demo")]
pub mod demo;
pub mod notifier;
pub mod review;
pub mod room_token;
pub mod session;

pub use astrologer::{AstrologerService, AstrologerServiceError};
pub use chat::{ChatService, ChatServiceError};
pub use notifier::SessionNotifier;
pub use review::{ReviewService, ReviewServiceError};
pub use room_token::{RoomToken, RoomTokenError, RoomTokenService};
pub use session::{SessionService, SessionServiceError};
