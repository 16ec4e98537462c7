//! Application-level configuration loading: session defaults, flush retries, mail and billing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_BACK_CONFIG_PATH";
/// Lower bound of the transition timeout, in milliseconds.
const MIN_TRANSITION_TIMEOUT_MS: u64 = 1_000;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Scoreboard defaults.
    pub session: SessionSettings,
    /// Retry policy used when saving on-court stat lines.
    pub flush: FlushPolicy,
    /// Sender identity of parent emails.
    pub mail: MailSettings,
    /// Checkout settings.
    pub billing: BillingSettings,
}

/// Scoreboard defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    /// Duration given to games created without one.
    pub default_duration_minutes: u32,
    /// Upper bound of a lifecycle transition, in milliseconds.
    pub transition_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: 32,
            transition_timeout_ms: 10_000,
        }
    }
}

impl SessionSettings {
    /// Transition timeout.
    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }
}

/// Bounded exponential retry applied to stat line writes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FlushPolicy {
    /// Number of write attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Ceiling of the retry delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Randomize each delay between half and the full value.
    pub jitter: bool,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
            jitter: true,
        }
    }
}

impl FlushPolicy {
    /// Delay to wait after the failed attempt number `attempt` (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        let millis = if self.jitter && base > 1 {
            rand::random_range(base / 2..=base)
        } else {
            base
        };
        Duration::from_millis(millis)
    }
}

/// Sender identity of parent emails.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailSettings {
    /// Address emails are sent from.
    pub sender_email: String,
    /// Display name emails are sent from.
    pub sender_name: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender_email: "no-reply@courtside.app".into(),
            sender_name: "Coach".into(),
        }
    }
}

/// Checkout settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BillingSettings {
    /// Price of the communication subscription.
    pub price_id: String,
    /// Redirect target after a successful checkout. `{CHECKOUT_SESSION_ID}` is kept verbatim.
    pub success_url: String,
    /// Redirect target after an abandoned checkout.
    pub cancel_url: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            price_id: String::new(),
            success_url: "http://localhost:3000/payment-success?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "http://localhost:3000/payment-cancel".into(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        flush_attempts = app_config.flush.max_attempts,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    session: SessionSettings,
    flush: FlushPolicy,
    mail: MailSettings,
    billing: BillingSettings,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            mut session,
            mut flush,
            mail,
            billing,
        } = value;

        session.default_duration_minutes = session.default_duration_minutes.max(1);
        flush.max_attempts = flush.max_attempts.max(1);
        flush.max_backoff_ms = flush.max_backoff_ms.max(flush.initial_backoff_ms);
        // A bulk flush must be able to sit through its own retry delays.
        session.transition_timeout_ms = session
            .transition_timeout_ms
            .max(MIN_TRANSITION_TIMEOUT_MS)
            .max(flush.max_backoff_ms.saturating_mul(u64::from(flush.max_attempts)));

        Self {
            session,
            flush,
            mail,
            billing,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let config = AppConfig::parse(r#"{"mail": {"sender_name": "Coach Kim"}}"#).unwrap();
        assert_eq!(config.session, SessionSettings::default());
        assert_eq!(config.mail.sender_name, "Coach Kim");
        assert_eq!(config.mail.sender_email, MailSettings::default().sender_email);
    }

    #[test]
    fn nonsensical_values_are_clamped() {
        let config = AppConfig::parse(
            r#"{"flush": {"max_attempts": 0, "initial_backoff_ms": 500, "max_backoff_ms": 100}}"#,
        )
        .unwrap();
        assert_eq!(config.flush.max_attempts, 1);
        assert_eq!(config.flush.max_backoff_ms, 500);
    }

    #[test]
    fn transition_timeout_covers_the_flush_retries() {
        let config = AppConfig::parse(
            r#"{"session": {"transition_timeout_ms": 0}, "flush": {"max_attempts": 4, "initial_backoff_ms": 100, "max_backoff_ms": 800}}"#,
        )
        .unwrap();
        assert_eq!(config.session.transition_timeout_ms, 3_200);

        let config = AppConfig::parse(
            r#"{"session": {"transition_timeout_ms": 5}, "flush": {"max_attempts": 1, "initial_backoff_ms": 10, "max_backoff_ms": 10}}"#,
        )
        .unwrap();
        assert_eq!(
            config.session.transition_timeout(),
            Duration::from_millis(MIN_TRANSITION_TIMEOUT_MS)
        );
    }

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let policy = FlushPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            jitter: false,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(30), Duration::from_millis(350));
    }

    #[test]
    fn jittered_backoff_stays_within_bounds() {
        let policy = FlushPolicy::default();
        for attempt in 1..6 {
            let delay = policy.backoff(attempt);
            assert!(delay <= Duration::from_millis(policy.max_backoff_ms));
            assert!(delay >= Duration::from_millis(policy.initial_backoff_ms / 2));
        }
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(AppConfig::parse("{not json").is_err());
    }
}
