//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API token. Required.
    pub bot_token: SecretString,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
    /// Abandoned goal conversations expire after this long. `None` keeps them
    /// open until the user answers or cancels.
    pub session_idle_timeout: Option<Duration>,
    /// A per-user lane task exits after being idle this long.
    pub lane_idle_timeout: Duration,
    /// Also attach the stdin/stdout channel.
    pub cli_enabled: bool,
}

impl BotConfig {
    pub const TOKEN_VAR: &'static str = "BOT_TOKEN";
    pub const POLL_TIMEOUT_VAR: &'static str = "BOT_POLL_TIMEOUT_SECS";
    pub const SESSION_IDLE_VAR: &'static str = "BOT_SESSION_IDLE_TIMEOUT_SECS";
    pub const LANE_IDLE_VAR: &'static str = "BOT_LANE_IDLE_SECS";
    pub const CLI_VAR: &'static str = "BOT_CLI";

    /// Build the config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(Self::TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: Self::TOKEN_VAR.to_string(),
                hint: "Set it to the token issued by BotFather.".to_string(),
            })?;

        let poll_timeout = parse_secs(&lookup, Self::POLL_TIMEOUT_VAR)?.unwrap_or(30);
        let session_idle = parse_secs(&lookup, Self::SESSION_IDLE_VAR)?;
        let lane_idle = parse_secs(&lookup, Self::LANE_IDLE_VAR)?.unwrap_or(300);
        let cli_enabled = parse_bool(&lookup, Self::CLI_VAR)?.unwrap_or(false);

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            poll_timeout: Duration::from_secs(poll_timeout),
            session_idle_timeout: session_idle.map(Duration::from_secs),
            lane_idle_timeout: Duration::from_secs(lane_idle),
            cli_enabled,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a whole number of seconds, got {raw:?}"),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(Some(secs))
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = BotConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "BOT_TOKEN"));
    }

    #[test]
    fn blank_token_is_fatal() {
        let err = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "123:ABC")])).unwrap();
        assert_eq!(config.bot_token.expose_secret(), "123:ABC");
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
        assert_eq!(config.session_idle_timeout, None);
        assert_eq!(config.lane_idle_timeout, Duration::from_secs(300));
        assert!(!config.cli_enabled);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("BOT_POLL_TIMEOUT_SECS", "10"),
            ("BOT_SESSION_IDLE_TIMEOUT_SECS", "900"),
            ("BOT_LANE_IDLE_SECS", "60"),
            ("BOT_CLI", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
        assert_eq!(config.session_idle_timeout, Some(Duration::from_secs(900)));
        assert_eq!(config.lane_idle_timeout, Duration::from_secs(60));
        assert!(config.cli_enabled);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("BOT_POLL_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_POLL_TIMEOUT_SECS")
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("BOT_SESSION_IDLE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let err =
            BotConfig::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("BOT_CLI", "maybe")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_CLI"));
    }
}
