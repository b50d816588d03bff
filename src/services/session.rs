//! Session lifecycle service
//!
//! Owns the call-session state machine:
//!
//! ```text
//! pending --accept (astrologer)--------> active
//! pending --decline/cancel (either)----> declined
//! active  --end (either)---------------> ended
//! ```
//!
//! `ended` and `declined` are terminal. Transitions are applied through the
//! repository's guarded updates, so racing writers never double-apply: the
//! loser re-reads the row and either treats the race as success (both sides
//! wanted the same terminal state) or reports an illegal transition.
//!
//! Identity checks here stand in for the access-control rules of the
//! persistence platform: the state guards themselves are identity-blind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::db::repositories::{AstrologerRepository, CallSessionRepository};
use crate::models::{CallSession, CreateSessionInput, SessionStatus};
use crate::services::notifier::SessionNotifier;

/// Session service errors
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// Session id does not exist
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Astrologer id does not exist
    #[error("Astrologer not found: {0}")]
    AstrologerNotFound(String),

    /// Operation attempted from a state that does not permit it
    #[error("Illegal transition: session {id} is {status}")]
    IllegalTransition { id: String, status: SessionStatus },

    /// Caller is not allowed to drive this transition
    #[error("{0}")]
    Unauthorized(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database or other internal failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Session lifecycle service
pub struct SessionService {
    sessions: Arc<dyn CallSessionRepository>,
    astrologers: Arc<dyn AstrologerRepository>,
    notifier: Arc<SessionNotifier>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn CallSessionRepository>,
        astrologers: Arc<dyn AstrologerRepository>,
        notifier: Arc<SessionNotifier>,
    ) -> Self {
        Self {
            sessions,
            astrologers,
            notifier,
        }
    }

    /// Create a new session in `pending`.
    ///
    /// The room name carries a random component so concurrent sessions can
    /// never collide on a guessable name.
    pub async fn create(
        &self,
        input: CreateSessionInput,
    ) -> Result<CallSession, SessionServiceError> {
        if input.user_id.trim().is_empty() || input.astro_id.trim().is_empty() {
            return Err(SessionServiceError::Validation(
                "user_id and astro_id are required".to_string(),
            ));
        }
        if input.user_id == input.astro_id {
            return Err(SessionServiceError::Validation(
                "A consultant cannot start a call with themselves".to_string(),
            ));
        }
        if self
            .astrologers
            .get_by_id(&input.astro_id)
            .await?
            .is_none()
        {
            return Err(SessionServiceError::AstrologerNotFound(input.astro_id));
        }

        let session = CallSession {
            id: Uuid::new_v4().to_string(),
            room_name: format!(
                "room_{}_{}_{}",
                input.user_id,
                input.astro_id,
                Uuid::new_v4().simple()
            ),
            user_id: input.user_id,
            user_name: input.user_name,
            astro_id: input.astro_id,
            astro_name: input.astro_name,
            status: SessionStatus::Pending,
            started_at: None,
            ended_at: None,
            duration_seconds: 0,
            created_at: Utc::now().timestamp_millis(),
        };

        self.sessions.create(&session).await?;
        self.notifier.publish(&session).await;
        tracing::info!(session_id = %session.id, astro_id = %session.astro_id, "Call session created");
        Ok(session)
    }

    /// Get a session by id.
    pub async fn get(&self, id: &str) -> Result<CallSession, SessionServiceError> {
        self.sessions
            .get_by_id(id)
            .await?
            .ok_or_else(|| SessionServiceError::NotFound(id.to_string()))
    }

    /// Sessions for a participant (either role), newest first.
    pub async fn list_for_participant(
        &self,
        participant: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<CallSession>, SessionServiceError> {
        Ok(self.sessions.list_for_participant(participant, status).await?)
    }

    /// Accept a pending session. Only the session's astrologer may accept.
    pub async fn accept(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<CallSession, SessionServiceError> {
        let session = self.get(id).await?;
        if actor != session.astro_id {
            return Err(SessionServiceError::Unauthorized(
                "Only the astrologer may accept a call".to_string(),
            ));
        }

        let started_at = Utc::now().timestamp_millis();
        if self.sessions.mark_active(id, started_at).await? {
            let session = self.get(id).await?;
            self.notifier.publish(&session).await;
            tracing::info!(session_id = %id, "Call session accepted");
            return Ok(session);
        }

        // Lost the race or the session already left pending. Never re-set
        // started_at; report what state won.
        let session = self.get(id).await?;
        Err(SessionServiceError::IllegalTransition {
            id: id.to_string(),
            status: session.status,
        })
    }

    /// Decline a pending session (astrologer side).
    pub async fn decline(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<CallSession, SessionServiceError> {
        self.abort_pending(id, actor).await
    }

    /// Cancel a pending session (client side). Structurally identical to
    /// decline at the data layer; both end in `declined`.
    pub async fn cancel(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<CallSession, SessionServiceError> {
        self.abort_pending(id, actor).await
    }

    async fn abort_pending(
        &self,
        id: &str,
        actor: &str,
    ) -> Result<CallSession, SessionServiceError> {
        let session = self.get(id).await?;
        if !session.is_participant(actor) {
            return Err(SessionServiceError::Unauthorized(
                "Not a participant in this session".to_string(),
            ));
        }

        if self.sessions.mark_declined(id).await? {
            let session = self.get(id).await?;
            self.notifier.publish(&session).await;
            tracing::info!(session_id = %id, "Call session declined");
            return Ok(session);
        }

        let session = self.get(id).await?;
        if session.status == SessionStatus::Declined {
            // Both sides aborted at once; the second writer sees the state
            // it wanted and succeeds without mutating anything.
            return Ok(session);
        }
        Err(SessionServiceError::IllegalTransition {
            id: id.to_string(),
            status: session.status,
        })
    }

    /// End an active session. Either participant may end.
    ///
    /// `duration_seconds` is floored to whole seconds and clamped to zero
    /// when clock skew would make the delta negative.
    pub async fn end(&self, id: &str, actor: &str) -> Result<CallSession, SessionServiceError> {
        let session = self.get(id).await?;
        if !session.is_participant(actor) {
            return Err(SessionServiceError::Unauthorized(
                "Not a participant in this session".to_string(),
            ));
        }

        let ended_at = Utc::now().timestamp_millis();
        let duration_seconds = compute_duration_seconds(session.started_at, ended_at);

        if self.sessions.mark_ended(id, ended_at, duration_seconds).await? {
            // Only the winning writer bumps the call counter.
            self.astrologers
                .increment_total_calls(&session.astro_id)
                .await?;
            let session = self.get(id).await?;
            self.notifier.publish(&session).await;
            tracing::info!(
                session_id = %id,
                astro_id = %session.astro_id,
                duration_seconds,
                "Call session ended"
            );
            return Ok(session);
        }

        let session = self.get(id).await?;
        if session.status == SessionStatus::Ended {
            // The other participant ended first; idempotent success.
            return Ok(session);
        }
        Err(SessionServiceError::IllegalTransition {
            id: id.to_string(),
            status: session.status,
        })
    }

    /// Subscribe to a session's state changes, seeded with the current state.
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Result<tokio::sync::watch::Receiver<CallSession>, SessionServiceError> {
        let snapshot = self.get(id).await?;
        self.subscribe_from(snapshot).await
    }

    /// Register a subscriber seeded with `snapshot`, then re-read the row.
    ///
    /// A transition can land between the snapshot read and the channel
    /// registration; if it was terminal, its publish found no channel and
    /// was dropped, so the subscriber would sit on the stale snapshot
    /// forever. The re-read pushes the fresh state through the channel the
    /// subscriber now holds.
    async fn subscribe_from(
        &self,
        snapshot: CallSession,
    ) -> Result<tokio::sync::watch::Receiver<CallSession>, SessionServiceError> {
        let receiver = self.notifier.subscribe(&snapshot).await;
        if let Some(fresh) = self.sessions.get_by_id(&snapshot.id).await? {
            if fresh.status != snapshot.status {
                self.notifier.publish(&fresh).await;
            }
        }
        Ok(receiver)
    }

    /// Decline sessions that sat in `pending` longer than the TTL.
    ///
    /// Returns how many sessions this sweep transitioned.
    pub async fn sweep_stale_pending(
        &self,
        ttl: Duration,
    ) -> Result<usize, SessionServiceError> {
        let cutoff = Utc::now().timestamp_millis() - ttl.as_millis() as i64;
        let mut swept = 0;
        for id in self.sessions.stale_pending_ids(cutoff).await? {
            // A participant may still win the race against the sweep.
            if self.sessions.mark_declined(&id).await? {
                if let Some(session) = self.sessions.get_by_id(&id).await? {
                    self.notifier.publish(&session).await;
                }
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::info!(count = swept, "Declined stale pending sessions");
        }
        Ok(swept)
    }

    /// Spawn the periodic stale-pending sweep. A TTL of zero disables it.
    pub fn spawn_sweeper(self: &Arc<Self>, config: &SessionConfig) {
        if config.pending_ttl_seconds == 0 {
            tracing::info!("Pending-session sweep disabled");
            return;
        }
        let service = Arc::clone(self);
        let ttl = Duration::from_secs(config.pending_ttl_seconds);
        let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = service.sweep_stale_pending(ttl).await {
                    tracing::warn!("Stale-pending sweep failed: {}", e);
                }
            }
        });
    }
}

/// Whole seconds between start and end, clamped to zero for skewed clocks.
fn compute_duration_seconds(started_at: Option<i64>, ended_at: i64) -> i64 {
    match started_at {
        Some(started_at) => ((ended_at - started_at) / 1000).max(0),
        None => 0,
    }
}

#[cfg(test)]
mod property_tests {
    use super::compute_duration_seconds;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn duration_is_never_negative(
            started_at in proptest::option::of(0i64..=2_000_000_000_000),
            ended_at in 0i64..=2_000_000_000_000,
        ) {
            prop_assert!(compute_duration_seconds(started_at, ended_at) >= 0);
        }

        #[test]
        fn duration_floors_whole_seconds(
            started_at in 0i64..=1_000_000_000_000,
            elapsed_ms in 0i64..=1_000_000_000,
        ) {
            let duration = compute_duration_seconds(Some(started_at), started_at + elapsed_ms);
            prop_assert_eq!(duration, elapsed_ms / 1000);
        }
    }
}
