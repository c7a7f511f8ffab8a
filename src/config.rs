use std::time::Duration;

use tracing::warn;

/// Default time-to-live for a cached permission set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default period of the background cache sweep.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Environment variable holding the cache TTL in minutes.
pub const ENV_CACHE_TTL: &str = "CACHE_TTL_MINUTES";

/// Environment variable holding the sweep interval in minutes.
pub const ENV_CACHE_CLEANUP_INTERVAL: &str = "CACHE_CLEANUP_INTERVAL_MINUTES";

/// Environment variable toggling the cache.
pub const ENV_CACHE_ENABLED: &str = "CACHE_ENABLED";

/// Largest accepted minutes value (one year); larger values fall back to the default.
pub const MAX_SETTING_MINUTES: u64 = 365 * 24 * 60;

/// Authorizer cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AuthorizerConfig {
    /// How long a loaded permission set answers lookups.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub cache_ttl: Duration,
    /// How often expired entries are swept from memory.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub cleanup_interval: Duration,
    /// Whether permission sets are cached at all.
    pub cache_enabled: bool,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            cache_enabled: true,
        }
    }
}

impl AuthorizerConfig {
    /// Reads settings from the process environment.
    ///
    /// Missing or malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_environment(::config::Environment::default())
    }

    fn from_environment(source: ::config::Environment) -> Self {
        let settings = match ::config::Config::builder().add_source(source).build() {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "failed to read environment, using defaults");
                return Self::default();
            }
        };
        // Environment keys are stored lowercased.
        Self::from_lookup(|key| settings.get_string(&key.to_ascii_lowercase()).ok())
    }

    /// Reads settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: minutes(&lookup, ENV_CACHE_TTL).unwrap_or(defaults.cache_ttl),
            cleanup_interval: minutes(&lookup, ENV_CACHE_CLEANUP_INTERVAL)
                .unwrap_or(defaults.cleanup_interval),
            cache_enabled: flag(&lookup, ENV_CACHE_ENABLED).unwrap_or(defaults.cache_enabled),
        }
    }
}

fn minutes(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if (1..=MAX_SETTING_MINUTES).contains(&value) => {
            Some(Duration::from_secs(value * 60))
        }
        _ => {
            warn!(key, value = %raw, "ignoring invalid minutes value");
            None
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring invalid boolean value");
            None
        }
    }
}
