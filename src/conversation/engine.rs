//! Conversation engine: owns the per-user session table and applies
//! state-machine effects to the profile store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::state::{ConversationEvent, ConversationSession, ConversationState, Effect, transition};
use crate::profile::ProfileStore;

/// Extra age a session must reach before the background prune removes it.
///
/// Lazy expiry on the user's own message uses the exact timeout; the prune
/// runs on its own clock and must not remove a session a reply is already
/// being routed into.
pub const PRUNE_GRACE: Duration = Duration::from_secs(60);

/// Tracks which users are mid-conversation.
///
/// A user with no entry is `Idle`. Callers must serialize messages per user;
/// the engine itself only guarantees that the table stays consistent.
pub struct ConversationEngine {
    sessions: RwLock<HashMap<String, ConversationSession>>,
    profiles: Arc<ProfileStore>,
    idle_timeout: Option<Duration>,
}

impl ConversationEngine {
    /// Create an engine. With `idle_timeout` set, open sessions older than the
    /// timeout are treated as abandoned.
    pub fn new(profiles: Arc<ProfileStore>, idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            profiles,
            idle_timeout,
        }
    }

    /// Current state for a user, after dropping an expired session.
    pub async fn state(&self, user_id: &str) -> ConversationState {
        self.state_at(user_id, Utc::now()).await
    }

    pub async fn state_at(&self, user_id: &str, now: DateTime<Utc>) -> ConversationState {
        self.expire_if_stale(user_id, now).await;
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Whether the user's messages are currently captured by a conversation.
    pub async fn has_open_session(&self, user_id: &str) -> bool {
        self.state(user_id).await.is_open()
    }

    /// Feed an event for one user and carry out the resulting effect.
    pub async fn apply(&self, user_id: &str, event: ConversationEvent) -> Effect {
        self.apply_at(user_id, event, Utc::now()).await
    }

    pub async fn apply_at(
        &self,
        user_id: &str,
        event: ConversationEvent,
        now: DateTime<Utc>,
    ) -> Effect {
        self.expire_if_stale(user_id, now).await;

        let effect = {
            let mut sessions = self.sessions.write().await;
            let current = sessions.get(user_id).map(|s| s.state).unwrap_or_default();
            let (next, effect) = transition(current, event);

            if next.is_open() {
                if next != current {
                    sessions.insert(user_id.to_string(), ConversationSession::new(next, now));
                }
            } else {
                sessions.remove(user_id);
            }

            debug!(user_id, from = %current, to = %next, ?effect, "Conversation transition");
            effect
        };

        if let Effect::StoreGoal(ref goal) = effect {
            self.profiles.set_week_goal(user_id, goal.clone()).await;
            info!(user_id, goal_set = goal.is_some(), "Weekly goal stored");
        }

        effect
    }

    /// Remove every session that has been idle past the timeout plus
    /// [`PRUNE_GRACE`].
    ///
    /// Returns how many were dropped. A no-op without a timeout.
    pub async fn prune_abandoned(&self) -> usize {
        self.prune_abandoned_at(Utc::now()).await
    }

    pub async fn prune_abandoned_at(&self, now: DateTime<Utc>) -> usize {
        let Some(timeout) = self.idle_timeout else {
            return 0;
        };
        let cutoff = timeout + PRUNE_GRACE;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(cutoff, now));
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(pruned, "Pruned abandoned conversations");
        }
        pruned
    }

    /// Number of open sessions.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn expire_if_stale(&self, user_id: &str, now: DateTime<Utc>) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(user_id) else {
            return;
        };
        if !session.is_expired(timeout, now) {
            return;
        }
        let state = session.state;
        sessions.remove(user_id);
        info!(user_id, %state, "Conversation expired");
    }
}
