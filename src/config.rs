//! Runtime configuration.
//!
//! Every tunable of the allocator and the posters lives in one [`Config`]
//! value. It is built once in `main` and passed by reference from there on;
//! nothing below `main` reads environment variables.
//!
//! ## Sources
//!
//! 1. Stock defaults ([`Config::default`]).
//! 2. `zine.toml` (or the file given with `--config`), merged key-by-key on
//!    top of the defaults. The file is sparse: set only what you change.
//! 3. Environment overrides for secrets and the fast-mode switch
//!    ([`Config::apply_env`]). Secrets are never read from the TOML file.
//!
//! ```toml
//! [allocation]
//! daily_images = 12
//!
//! [posting.twitter]
//! count = 4
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "zine.toml";

/// Upper bound for a pause between posts (one hour).
pub const MAX_DELAY_SECS: f64 = 3600.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete configuration for one process run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Input/output locations.
    pub paths: PathsConfig,
    /// Daily budget, platform ratios, used-image cap.
    pub allocation: AllocationConfig,
    /// Per-platform run sizes and pacing.
    pub posting: PostingConfig,
    /// Patreon API client settings.
    pub patreon: PatreonConfig,
    /// Log level and log file switch.
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.allocation;
        if a.daily_images == 0 {
            return Err(ConfigError::Validation(
                "allocation.daily_images must be at least 1".into(),
            ));
        }
        for platform in Platform::ALL {
            let ratio = a.ratios.get(platform);
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::Validation(format!(
                    "allocation.ratios.{} must be between 0 and 1",
                    platform.key()
                )));
            }
        }
        let sum = a.ratios.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "allocation.ratios must sum to 1.0 (got {sum})"
            )));
        }
        if a.used_images_keep > a.used_images_soft_cap {
            return Err(ConfigError::Validation(
                "allocation.used_images_keep must not exceed used_images_soft_cap".into(),
            ));
        }
        for platform in Platform::ALL {
            let [min, max] = self.posting.for_platform(platform).delay_secs;
            let in_range = |v: f64| v.is_finite() && (0.0..=MAX_DELAY_SECS).contains(&v);
            if !in_range(min) || !in_range(max) || max < min {
                return Err(ConfigError::Validation(format!(
                    "posting.{}.delay_secs must be [min, max] with 0 <= min <= max <= {}",
                    platform.key(),
                    MAX_DELAY_SECS
                )));
            }
        }
        if self.patreon.enabled && self.patreon.campaign_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "patreon.campaign_id is required when patreon.enabled = true".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    ///
    /// - `PATREON_CLIENT_ID`, `PATREON_CLIENT_SECRET`, `PATREON_ACCESS_TOKEN`,
    ///   `PATREON_REFRESH_TOKEN` fill the Patreon credentials.
    /// - `PATREON_CAMPAIGN_ID` overrides `patreon.campaign_id`.
    /// - `ZINE_FAST_MODE` (`1`/`true`/`yes`) turns on `posting.fast_mode`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let creds = &mut self.patreon.credentials;
        if let Some(v) = non_empty("PATREON_CLIENT_ID") {
            creds.client_id = Some(v);
        }
        if let Some(v) = non_empty("PATREON_CLIENT_SECRET") {
            creds.client_secret = Some(v);
        }
        if let Some(v) = non_empty("PATREON_ACCESS_TOKEN") {
            creds.access_token = Some(v);
        }
        if let Some(v) = non_empty("PATREON_REFRESH_TOKEN") {
            creds.refresh_token = Some(v);
        }
        if let Some(v) = non_empty("PATREON_CAMPAIGN_ID") {
            self.patreon.campaign_id = v;
        }
        if let Some(v) = non_empty("ZINE_FAST_MODE") {
            self.posting.fast_mode = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

/// File and directory locations, relative to the working directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the generated images, one subdirectory per style.
    pub images_dir: PathBuf,
    /// Directory of `<style>_captions.txt` files.
    pub captions_dir: PathBuf,
    /// Where post summaries are written.
    pub posts_dir: PathBuf,
    /// The allocation state document.
    pub state_file: PathBuf,
    /// Plain-text allocation report, rewritten on every allocator run.
    pub summary_file: PathBuf,
    /// Directory for per-run log files.
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            captions_dir: PathBuf::from("captions"),
            posts_dir: PathBuf::from("posts"),
            state_file: PathBuf::from("image_allocation_state.json"),
            summary_file: PathBuf::from("allocation_summary.txt"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Allocation budget and platform split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationConfig {
    /// Images expected per day (the budget `N` the ratios are applied to).
    pub daily_images: usize,
    /// Trim `used_images` once it grows past this many entries.
    pub used_images_soft_cap: usize,
    /// Number of most recent entries kept when trimming.
    pub used_images_keep: usize,
    /// Share of the daily budget per platform.
    pub ratios: RatioConfig,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            daily_images: 10,
            used_images_soft_cap: 10_000,
            used_images_keep: 5_000,
            ratios: RatioConfig::default(),
        }
    }
}

/// Platform shares of the daily budget. Must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RatioConfig {
    pub instagram: f64,
    pub twitter: f64,
    pub linkedin: f64,
    pub patreon: f64,
}

impl RatioConfig {
    pub fn get(&self, platform: Platform) -> f64 {
        match platform {
            Platform::Instagram => self.instagram,
            Platform::Twitter => self.twitter,
            Platform::Linkedin => self.linkedin,
            Platform::Patreon => self.patreon,
        }
    }

    pub fn sum(&self) -> f64 {
        Platform::ALL.iter().map(|&p| self.get(p)).sum()
    }
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            instagram: 0.30,
            twitter: 0.30,
            linkedin: 0.20,
            patreon: 0.20,
        }
    }
}

/// Posting settings for all platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostingConfig {
    /// Skip all pacing delays (for manual runs and CI).
    pub fast_mode: bool,
    pub instagram: PlatformPosting,
    pub twitter: PlatformPosting,
    pub linkedin: PlatformPosting,
    pub patreon: PlatformPosting,
}

impl PostingConfig {
    pub fn for_platform(&self, platform: Platform) -> &PlatformPosting {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Twitter => &self.twitter,
            Platform::Linkedin => &self.linkedin,
            Platform::Patreon => &self.patreon,
        }
    }

    /// Delay range between posts, honoring `fast_mode`.
    pub fn delay_range(&self, platform: Platform) -> (f64, f64) {
        if self.fast_mode {
            return (0.0, 0.0);
        }
        let [min, max] = self.for_platform(platform).delay_secs;
        (min, max)
    }
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            instagram: PlatformPosting {
                count: 3,
                delay_secs: [1.0, 3.0],
            },
            twitter: PlatformPosting {
                count: 3,
                delay_secs: [1.0, 1.0],
            },
            linkedin: PlatformPosting {
                count: 2,
                delay_secs: [1.0, 1.0],
            },
            patreon: PlatformPosting {
                count: 2,
                delay_secs: [30.0, 60.0],
            },
        }
    }
}

/// One platform's run size and pacing.
///
/// Both keys are required once a `[posting.<platform>]` table is parsed on
/// its own; [`load_config`] always merges onto the stock values first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformPosting {
    /// Images popped from the pool per run.
    pub count: usize,
    /// Random wait between successive posts, `[min, max]` seconds.
    pub delay_secs: [f64; 2],
}

/// Patreon API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatreonConfig {
    /// Post through the real API. When off, Patreon runs are simulated.
    pub enabled: bool,
    pub api_base: String,
    pub token_url: String,
    pub campaign_id: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries for 429/5xx and transport errors, on top of the first attempt.
    pub max_retries: u32,
    /// Populated from the environment only.
    #[serde(skip)]
    pub credentials: PatreonCredentials,
}

impl Default for PatreonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://www.patreon.com/api/oauth2/v2".to_string(),
            token_url: "https://www.patreon.com/api/oauth2/token".to_string(),
            campaign_id: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            credentials: PatreonCredentials::default(),
        }
    }
}

/// OAuth credentials for the Patreon API.
#[derive(Clone, Default)]
pub struct PatreonCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for PatreonCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("PatreonCredentials")
            .field("client_id", &mask(&self.client_id))
            .field("client_secret", &mask(&self.client_secret))
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .finish()
    }
}

/// Logging settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write a per-run log file under `paths.log_dir`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
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

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file is not an error: the stock defaults are used.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `zine.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# zine-pools configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.
#
# Secrets are NOT read from this file. Set them in the environment:
#   PATREON_CLIENT_ID, PATREON_CLIENT_SECRET,
#   PATREON_ACCESS_TOKEN, PATREON_REFRESH_TOKEN, PATREON_CAMPAIGN_ID
# ZINE_FAST_MODE=1 disables all posting delays.

# ---------------------------------------------------------------------------
# Locations (relative to the working directory)
# ---------------------------------------------------------------------------
[paths]
images_dir = "images"          # images/<style>/<style>_image_NN_YYYYMMDD_HHMMSS.jpg
captions_dir = "captions"      # captions/<style>_captions.txt, line i = image i+1
posts_dir = "posts"            # per-run post summaries (.json + .txt)
state_file = "image_allocation_state.json"
summary_file = "allocation_summary.txt"
log_dir = "logs"

# ---------------------------------------------------------------------------
# Allocation
# ---------------------------------------------------------------------------
[allocation]
# Images generated per day. Ratios are applied to this number, not to the
# number of images actually found.
daily_images = 10

# When the used-image registry grows past the soft cap it is trimmed to the
# most recent `used_images_keep` entries.
used_images_soft_cap = 10000
used_images_keep = 5000

# Share of the daily budget per platform. Must sum to 1.0.
[allocation.ratios]
instagram = 0.30
twitter = 0.30
linkedin = 0.20
patreon = 0.20

# ---------------------------------------------------------------------------
# Posting
# ---------------------------------------------------------------------------
[posting]
# Skip all delays between posts.
fast_mode = false

# count: images taken from the pool per run.
# delay_secs: random wait [min, max] between successive posts.
[posting.instagram]
count = 3
delay_secs = [1.0, 3.0]

[posting.twitter]
count = 3
delay_secs = [1.0, 1.0]

[posting.linkedin]
count = 2
delay_secs = [1.0, 1.0]

[posting.patreon]
count = 2
delay_secs = [30.0, 60.0]

# ---------------------------------------------------------------------------
# Patreon API (the other platforms are simulated)
# ---------------------------------------------------------------------------
[patreon]
enabled = false
api_base = "https://www.patreon.com/api/oauth2/v2"
token_url = "https://www.patreon.com/api/oauth2/token"
campaign_id = ""
timeout_secs = 30
max_retries = 3

# ---------------------------------------------------------------------------
# Logging (RUST_LOG overrides `level`)
# ---------------------------------------------------------------------------
[logging]
level = "info"
file = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_daily_budget() {
        let config = Config::default();
        assert_eq!(config.allocation.daily_images, 10);
        assert_eq!(config.allocation.used_images_soft_cap, 10_000);
        assert_eq!(config.allocation.used_images_keep, 5_000);
        assert!((config.allocation.ratios.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_posting_counts() {
        let posting = PostingConfig::default();
        assert_eq!(posting.for_platform(Platform::Instagram).count, 3);
        assert_eq!(posting.for_platform(Platform::Twitter).count, 3);
        assert_eq!(posting.for_platform(Platform::Linkedin).count, 2);
        assert_eq!(posting.for_platform(Platform::Patreon).count, 2);
    }

    #[test]
    fn fast_mode_zeroes_delays() {
        let mut posting = PostingConfig::default();
        assert_eq!(posting.delay_range(Platform::Patreon), (30.0, 60.0));
        posting.fast_mode = true;
        assert_eq!(posting.delay_range(Platform::Patreon), (0.0, 0.0));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("zine.toml")).unwrap();
        assert_eq!(config.allocation.daily_images, 10);
        assert_eq!(config.paths.state_file, PathBuf::from("image_allocation_state.json"));
    }

    #[test]
    fn load_config_merges_partial_platform_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zine.toml");
        fs::write(
            &path,
            r#"
[posting.twitter]
count = 5
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.posting.twitter.count, 5);
        // delay_secs came from the stock defaults
        assert_eq!(config.posting.twitter.delay_secs, [1.0, 1.0]);
        assert_eq!(config.posting.instagram.count, 3);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zine.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zine.toml");
        fs::write(
            &path,
            r#"
[allocation]
daily_imgs = 12
"#,
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn secrets_in_toml_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zine.toml");
        fs::write(
            &path,
            r#"
[patreon]
access_token = "abc"
"#,
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_ratios_must_sum_to_one() {
        let mut config = Config::default();
        config.allocation.ratios.patreon = 0.30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn validate_ratio_out_of_range() {
        let mut config = Config::default();
        config.allocation.ratios.instagram = 1.3;
        config.allocation.ratios.twitter = -0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_budget() {
        let mut config = Config::default();
        config.allocation.daily_images = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_keep_above_cap() {
        let mut config = Config::default();
        config.allocation.used_images_keep = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_inverted_delay_range() {
        let mut config = Config::default();
        config.posting.linkedin.delay_secs = [5.0, 1.0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("posting.linkedin"));
    }

    #[test]
    fn validate_non_finite_delay_rejected() {
        let overlay: toml::Value = toml::from_str(
            r#"
[posting.twitter]
count = 3
delay_secs = [0.0, inf]
"#,
        )
        .unwrap();
        let err = resolve_config(Some(overlay)).unwrap_err();
        assert!(err.to_string().contains("posting.twitter"));

        let mut config = Config::default();
        config.posting.instagram.delay_secs = [f64::NAN, f64::NAN];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_delay_above_limit_rejected() {
        let mut config = Config::default();
        config.posting.patreon.delay_secs = [30.0, 1e30];
        assert!(config.validate().is_err());
        config.posting.patreon.delay_secs = [MAX_DELAY_SECS, MAX_DELAY_SECS];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_patreon_enabled_needs_campaign() {
        let mut config = Config::default();
        config.patreon.enabled = true;
        assert!(config.validate().is_err());
        config.patreon.campaign_id = "12345".into();
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Environment overrides
    // =========================================================================

    #[test]
    fn apply_env_fills_credentials_and_flags() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PATREON_ACCESS_TOKEN", "tok"),
            ("PATREON_CAMPAIGN_ID", "987"),
            ("PATREON_CLIENT_ID", ""),
            ("ZINE_FAST_MODE", "TRUE"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.patreon.credentials.access_token.as_deref(), Some("tok"));
        assert_eq!(config.patreon.credentials.client_id, None);
        assert_eq!(config.patreon.campaign_id, "987");
        assert!(config.posting.fast_mode);
    }

    #[test]
    fn credentials_debug_is_masked() {
        let creds = PatreonCredentials {
            access_token: Some("super-secret".into()),
            ..Default::default()
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<set>"));
    }

    // =========================================================================
    // merge_toml / stock config
    // =========================================================================

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str(
            r#"
[allocation.ratios]
instagram = 0.3
twitter = 0.3
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[allocation.ratios]
twitter = 0.4
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let ratios = merged.get("allocation").unwrap().get("ratios").unwrap();
        assert_eq!(ratios.get("twitter").unwrap().as_float(), Some(0.4));
        assert_eq!(ratios.get("instagram").unwrap().as_float(), Some(0.3));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(value)).unwrap();
        let defaults = Config::default();
        assert_eq!(config.allocation.daily_images, defaults.allocation.daily_images);
        assert_eq!(config.posting.patreon.delay_secs, [30.0, 60.0]);
        assert_eq!(config.patreon.api_base, defaults.patreon.api_base);
        assert_eq!(config.paths.captions_dir, PathBuf::from("captions"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["paths", "allocation", "posting", "patreon", "logging"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
