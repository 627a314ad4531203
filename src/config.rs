//! Bot configuration.
//!
//! Two independent inputs:
//!
//! - **Environment** (required): credentials and the catalog location. A
//!   missing variable is a startup error; nothing else runs without them.
//!
//!   | Variable | Meaning |
//!   |---|---|
//!   | `BSKY_USERNAME` | Bluesky handle or email |
//!   | `BSKY_PASSWORD` | Bluesky app password |
//!   | `GALAXY_CATALOG` | Path to the catalog CSV |
//!
//! - **`galaxy-post.toml`** (optional): tuning for retries, timeouts and the
//!   caption. Stock defaults are overridden by whatever keys the file sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [endpoint]
//! service = "https://bsky.social"
//! timeout_secs = 30
//!
//! [fetch]
//! timeout_secs = 30
//! max_bytes = 1000000        # Bluesky rejects larger blobs
//!
//! [publish]
//! max_attempts = 5
//! # deadline_secs = 600      # Stop retrying once this much time has passed
//!
//! [publish.backoff]
//! strategy = "constant"      # or "exponential"
//! interval_secs = 10
//! max_interval_secs = 300    # exponential only
//!
//! [caption]
//! decoration_odds = 20       # One caption in N gets the decoration line
//! decoration = "🔭✨"
//! unknown_instrument = "reject"   # or "placeholder"
//! instrument_placeholder = "unidentified instrument"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_USERNAME: &str = "BSKY_USERNAME";
pub const ENV_PASSWORD: &str = "BSKY_PASSWORD";
pub const ENV_CATALOG: &str = "GALAXY_CATALOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Bot configuration loaded from `galaxy-post.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Posting endpoint connection settings.
    pub endpoint: EndpointConfig,
    /// Image download settings.
    pub fetch: FetchConfig,
    /// Retry policy for the publish call.
    pub publish: PublishConfig,
    /// Caption rendering settings.
    pub caption: CaptionConfig,
}

impl BotConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.service.trim().is_empty() {
            return Err(ConfigError::Validation(
                "endpoint.service must not be empty".into(),
            ));
        }
        if self.endpoint.timeout_secs == 0 || self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be at least 1".into(),
            ));
        }
        if self.fetch.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_bytes must be non-zero".into(),
            ));
        }
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "publish.max_attempts must be at least 1".into(),
            ));
        }
        let backoff = &self.publish.backoff;
        if backoff.strategy == BackoffStrategy::Exponential
            && backoff.max_interval_secs < backoff.interval_secs
        {
            return Err(ConfigError::Validation(
                "publish.backoff.max_interval_secs must be >= interval_secs".into(),
            ));
        }
        if self.caption.decoration_odds == 0 {
            return Err(ConfigError::Validation(
                "caption.decoration_odds must be at least 1".into(),
            ));
        }
        if self.caption.instrument_placeholder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "caption.instrument_placeholder must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// Base URL of the PDS that hosts the account.
    pub service: String,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Largest image body accepted from the image host.
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wall-clock budget counted from the start of a run. No deadline when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
    pub backoff: BackoffConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            deadline_secs: None,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Constant,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub strategy: BackoffStrategy,
    /// Constant delay, or the first delay for exponential backoff.
    pub interval_secs: u64,
    /// Upper bound on a single exponential delay.
    pub max_interval_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Constant,
            interval_secs: 10,
            max_interval_secs: 300,
        }
    }
}

/// What to do when a project name maps to no known instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownInstrument {
    /// Fail the run with an unresolved-instrument error.
    Reject,
    /// Substitute `caption.instrument_placeholder`.
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    pub decoration_odds: u32,
    pub decoration: String,
    pub unknown_instrument: UnknownInstrument,
    pub instrument_placeholder: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            decoration_odds: 20,
            decoration: "🔭✨".to_string(),
            unknown_instrument: UnknownInstrument::Reject,
            instrument_placeholder: "unidentified instrument".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Login credentials for the posting account.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the process reads from its environment.
#[derive(Debug, Clone)]
pub struct Environment {
    pub credentials: Credentials,
    pub catalog_path: PathBuf,
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}

impl Environment {
    /// Read the environment through `lookup`. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            credentials: Credentials {
                identifier: required(&lookup, ENV_USERNAME)?,
                password: required(&lookup, ENV_PASSWORD)?,
            },
            catalog_path: PathBuf::from(required(&lookup, ENV_CATALOG)?),
        })
    }

    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Catalog path alone, for commands that never post.
pub fn catalog_path_from_env() -> Result<PathBuf, ConfigError> {
    required(&|name: &str| std::env::var(name).ok(), ENV_CATALOG).map(PathBuf::from)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BotConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BotConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BotConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over the stock defaults.
pub fn load_config(path: &Path) -> Result<BotConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Fully-commented stock `galaxy-post.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# galaxy-post configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Credentials never go here: set BSKY_USERNAME, BSKY_PASSWORD and
# GALAXY_CATALOG in the environment.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Posting endpoint
# ---------------------------------------------------------------------------
[endpoint]
# Base URL of the server hosting the account.
service = "https://bsky.social"

# Per-request timeout in seconds.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Image download
# ---------------------------------------------------------------------------
[fetch]
timeout_secs = 30

# Largest accepted image in bytes. Bluesky rejects blobs over ~1 MB.
max_bytes = 1000000

# ---------------------------------------------------------------------------
# Publishing
# ---------------------------------------------------------------------------
[publish]
# Total attempts, including the first. Only network failures are retried;
# a post the server rejects is reported immediately.
max_attempts = 5

# Give up retrying once this many seconds have elapsed.
# deadline_secs = 600

[publish.backoff]
# "constant" waits interval_secs between attempts; "exponential" doubles
# the wait each time, capped at max_interval_secs.
strategy = "constant"
interval_secs = 10
max_interval_secs = 300

# ---------------------------------------------------------------------------
# Caption
# ---------------------------------------------------------------------------
[caption]
# One caption in N gets the decoration appended as a final line.
decoration_odds = 20
decoration = "🔭✨"

# Projects that map to no known telescope: "reject" fails the run,
# "placeholder" writes instrument_placeholder into the caption instead.
unknown_instrument = "reject"
instrument_placeholder = "unidentified instrument"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = BotConfig::default();
        assert_eq!(config.endpoint.service, "https://bsky.social");
        assert_eq!(config.publish.max_attempts, 5);
        assert_eq!(config.publish.backoff.strategy, BackoffStrategy::Constant);
        assert_eq!(config.publish.backoff.interval_secs, 10);
        assert_eq!(config.publish.deadline_secs, None);
        assert_eq!(config.caption.decoration_odds, 20);
        assert_eq!(config.caption.unknown_instrument, UnknownInstrument::Reject);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(BotConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[publish]
max_attempts = 3
"#;
        let config: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.publish.max_attempts, 3);
        // Defaults preserved
        assert_eq!(config.publish.backoff.interval_secs, 10);
        assert_eq!(config.fetch.max_bytes, 1_000_000);
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: BotConfig = toml::from_str(stock_config_toml()).unwrap();
        let default = BotConfig::default();
        assert_eq!(parsed.endpoint.service, default.endpoint.service);
        assert_eq!(parsed.publish.max_attempts, default.publish.max_attempts);
        assert_eq!(parsed.caption.decoration, default.caption.decoration);
        assert_eq!(
            parsed.publish.backoff.max_interval_secs,
            default.publish.backoff.max_interval_secs
        );
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_overrides_nested_keys_only() {
        let overlay: toml::Value = toml::from_str(
            r#"
[publish.backoff]
strategy = "exponential"
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.publish.backoff.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.publish.backoff.interval_secs, 10);
        assert_eq!(config.publish.max_attempts, 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let overlay: toml::Value = toml::from_str("[publish]\nretries = 3\n").unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn zero_attempts_is_invalid() {
        let mut config = BotConfig::default();
        config.publish.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_decoration_odds_is_invalid() {
        let mut config = BotConfig::default();
        config.caption.decoration_odds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn exponential_cap_below_interval_is_invalid() {
        let mut config = BotConfig::default();
        config.publish.backoff.strategy = BackoffStrategy::Exponential;
        config.publish.backoff.max_interval_secs = 5;
        assert!(config.validate().is_err());

        // The cap is irrelevant for constant backoff
        config.publish.backoff.strategy = BackoffStrategy::Constant;
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("galaxy-post.toml")).unwrap();
        assert_eq!(config.publish.max_attempts, 5);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("galaxy-post.toml");
        fs::write(
            &path,
            r#"
[caption]
unknown_instrument = "placeholder"
instrument_placeholder = "a telescope"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.caption.unknown_instrument,
            UnknownInstrument::Placeholder
        );
        assert_eq!(config.caption.instrument_placeholder, "a telescope");
        assert_eq!(config.caption.decoration_odds, 20);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("galaxy-post.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_merged_result() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("galaxy-post.toml");
        fs::write(&path, "[publish]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Environment
    // =========================================================================

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn environment_reads_all_three() {
        let environment = Environment::from_lookup(env(&[
            (ENV_USERNAME, "galaxies.bsky.social"),
            (ENV_PASSWORD, "app-pass"),
            (ENV_CATALOG, "/data/catalog.csv"),
        ]))
        .unwrap();
        assert_eq!(environment.credentials.identifier, "galaxies.bsky.social");
        assert_eq!(environment.credentials.password, "app-pass");
        assert_eq!(environment.catalog_path, PathBuf::from("/data/catalog.csv"));
    }

    #[test]
    fn missing_variable_is_named() {
        let result = Environment::from_lookup(env(&[
            (ENV_USERNAME, "galaxies.bsky.social"),
            (ENV_CATALOG, "/data/catalog.csv"),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingEnv(ENV_PASSWORD))));
    }

    #[test]
    fn blank_variable_counts_as_missing() {
        let result = Environment::from_lookup(env(&[
            (ENV_USERNAME, "   "),
            (ENV_PASSWORD, "app-pass"),
            (ENV_CATALOG, "/data/catalog.csv"),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingEnv(ENV_USERNAME))));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            identifier: "me".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("redacted"));
    }
}
