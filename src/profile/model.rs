//! User profile model.

use serde::{Deserialize, Serialize};

/// What the bot remembers about a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Goal the user set for the current week.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_goal: Option<String>,
    /// Course the user last worked on. Reserved for the progress integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_course: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_empty() {
        let profile = UserProfile::default();
        assert_eq!(profile.week_goal, None);
        assert_eq!(profile.last_course, None);
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let json = serde_json::to_value(UserProfile::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let profile = UserProfile {
            week_goal: Some("finish 5 lessons".into()),
            last_course: None,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["week_goal"], "finish 5 lessons");
        assert!(json.get("last_course").is_none());
    }
}
