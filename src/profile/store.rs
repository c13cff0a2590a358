//! Profile store: one profile per user id, created on first access.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::model::UserProfile;

/// Shared handle to a single user's profile.
pub type ProfileHandle = Arc<RwLock<UserProfile>>;

/// In-memory profile store.
///
/// Profiles are never removed. The outer lock only guards the id → handle map;
/// reads and writes of a profile go through that profile's own lock, so users
/// never contend with each other beyond the map lookup.
#[derive(Default)]
pub struct ProfileStore {
    profiles: RwLock<HashMap<String, ProfileHandle>>,
}

impl ProfileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get the profile for `user_id`, creating an empty one on first access.
    ///
    /// Every call for the same id returns a handle to the same profile.
    pub async fn get_or_create(&self, user_id: &str) -> ProfileHandle {
        if let Some(profile) = self.profiles.read().await.get(user_id) {
            return Arc::clone(profile);
        }

        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id, "Creating profile");
            Arc::new(RwLock::new(UserProfile::default()))
        });
        Arc::clone(profile)
    }

    /// Set (or clear, with `None`) the weekly goal.
    pub async fn set_week_goal(&self, user_id: &str, goal: Option<String>) {
        let profile = self.get_or_create(user_id).await;
        profile.write().await.week_goal = goal;
    }

    /// Current weekly goal, if any.
    pub async fn week_goal(&self, user_id: &str) -> Option<String> {
        let profile = self.get_or_create(user_id).await;
        let guard = profile.read().await;
        guard.week_goal.clone()
    }

    /// Point-in-time copy of the profile, for the reply handlers.
    pub async fn snapshot(&self, user_id: &str) -> UserProfile {
        let profile = self.get_or_create(user_id).await;
        let guard = profile.read().await;
        guard.clone()
    }

    /// Number of known users.
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}
