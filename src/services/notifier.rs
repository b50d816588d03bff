//! Session change feed
//!
//! Push-based notification of session state. Each session id maps to a
//! `tokio::sync::watch` channel: subscribers always observe the latest
//! state (at-least-once, monotonically non-decreasing per session), and a
//! slow subscriber skips intermediate states rather than queueing them.
//! There is no ordering guarantee across different sessions.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock};

use crate::models::CallSession;

/// Registry of per-session watch channels
#[derive(Default)]
pub struct SessionNotifier {
    channels: RwLock<HashMap<String, watch::Sender<CallSession>>>,
}

impl SessionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest state of a session to any subscribers.
    ///
    /// A terminal state is the last value a channel will ever carry, so its
    /// registry entry is dropped after the send; receivers keep the final
    /// value and the registry does not grow forever.
    pub async fn publish(&self, session: &CallSession) {
        let mut channels = self.channels.write().await;
        match channels.get(&session.id) {
            Some(sender) => {
                sender.send_replace(session.clone());
                if session.status.is_terminal() {
                    channels.remove(&session.id);
                }
            }
            None => {
                if !session.status.is_terminal() {
                    let (sender, _) = watch::channel(session.clone());
                    channels.insert(session.id.clone(), sender);
                }
            }
        }
    }

    /// Subscribe to a session, seeding the stream with `current`.
    ///
    /// A terminal `current` gets a detached channel: no further state can
    /// follow, so nothing is registered for it.
    pub async fn subscribe(&self, current: &CallSession) -> watch::Receiver<CallSession> {
        let mut channels = self.channels.write().await;
        match channels.get(&current.id) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(current.clone());
                if !current.status.is_terminal() {
                    channels.insert(current.id.clone(), sender);
                }
                receiver
            }
        }
    }

    #[cfg(test)]
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
