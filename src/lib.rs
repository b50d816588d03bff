//! AstroCall - call-session backend for a video astrology marketplace
//!
//! Owns the call-session lifecycle state machine, in-call chat, reviews
//! with a transactional rating aggregate, LiveKit room-token issuance, and
//! the astrologer directory.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
