//! System configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/vigil/config.toml` (platform equivalent via
//! `dirs`). Every field has a default, so a missing or partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watcher::WatchConfig;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Repositories to show, in order
    pub repos: Vec<PathBuf>,

    /// Directories scanned for repositories
    pub roots: Vec<PathBuf>,

    /// How deep below each root to look for repositories
    pub discover_depth: usize,

    pub fetch: FetchConfig,
    pub watch: WatchConfig,
    pub refresh: RefreshConfig,
    pub review: ReviewConfig,
}

/// Fetch coordination settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Debounce for selection-driven detail fetches
    pub debounce_ms: u64,
    pub status_ttl_secs: u64,
    pub review_ttl_secs: u64,
    /// Maximum external commands running at once
    pub subprocess_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            status_ttl_secs: 5,
            review_ttl_secs: 60,
            subprocess_concurrency: 4,
        }
    }
}

impl FetchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }

    pub fn review_ttl(&self) -> Duration {
        Duration::from_secs(self.review_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between full refreshes (0 = never)
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl RefreshConfig {
    /// Refresh period, or `None` when periodic refresh is off
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Query open pull requests with `gh`
    pub enabled: bool,
    /// Maximum pull requests listed per repository
    pub limit: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 20,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            repos: Vec::new(),
            roots: Vec::new(),
            discover_depth: 2,
            fetch: FetchConfig::default(),
            watch: WatchConfig::default(),
            refresh: RefreshConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Check every value is within its supported range.
    pub fn validate(&self) -> Result<()> {
        let fetch = &self.fetch;
        if !(1..=64).contains(&fetch.subprocess_concurrency) {
            anyhow::bail!(
                "fetch.subprocess_concurrency must be between 1 and 64 (got {})",
                fetch.subprocess_concurrency
            );
        }
        if fetch.debounce_ms > 10_000 {
            anyhow::bail!("fetch.debounce_ms must be at most 10000 (got {})", fetch.debounce_ms);
        }
        if self.watch.debounce_ms > 10_000 {
            anyhow::bail!(
                "watch.debounce_ms must be at most 10000 (got {})",
                self.watch.debounce_ms
            );
        }
        for (key, value) in [
            ("fetch.status_ttl_secs", fetch.status_ttl_secs),
            ("fetch.review_ttl_secs", fetch.review_ttl_secs),
            ("refresh.interval_secs", self.refresh.interval_secs),
        ] {
            if value > 86_400 {
                anyhow::bail!("{} must be at most 86400 (got {})", key, value);
            }
        }
        if !(1..=8).contains(&self.discover_depth) {
            anyhow::bail!(
                "discover_depth must be between 1 and 8 (got {})",
                self.discover_depth
            );
        }
        if self.review.limit == 0 {
            anyhow::bail!("review.limit must be at least 1");
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: SystemConfig = toml::from_str(contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a value by its dotted key, formatted for display.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "repos" => format_paths(&self.repos),
            "roots" => format_paths(&self.roots),
            "discover_depth" => self.discover_depth.to_string(),
            "fetch.debounce_ms" => self.fetch.debounce_ms.to_string(),
            "fetch.status_ttl_secs" => self.fetch.status_ttl_secs.to_string(),
            "fetch.review_ttl_secs" => self.fetch.review_ttl_secs.to_string(),
            "fetch.subprocess_concurrency" => self.fetch.subprocess_concurrency.to_string(),
            "watch.enabled" => self.watch.enabled.to_string(),
            "watch.debounce_ms" => self.watch.debounce_ms.to_string(),
            "watch.ignore_patterns" => self.watch.ignore_patterns.join(", "),
            "refresh.interval_secs" => self.refresh.interval_secs.to_string(),
            "review.enabled" => self.review.enabled.to_string(),
            "review.limit" => self.review.limit.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'vigil config list' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Set a value by its dotted key. List keys take comma-separated values.
    ///
    /// The result is validated; on error `self` is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "repos" => updated.repos = parse_list(value).map(PathBuf::from).collect(),
            "roots" => updated.roots = parse_list(value).map(PathBuf::from).collect(),
            "discover_depth" => updated.discover_depth = parse_number(value)?,
            "fetch.debounce_ms" => updated.fetch.debounce_ms = parse_number(value)?,
            "fetch.status_ttl_secs" => updated.fetch.status_ttl_secs = parse_number(value)?,
            "fetch.review_ttl_secs" => updated.fetch.review_ttl_secs = parse_number(value)?,
            "fetch.subprocess_concurrency" => {
                updated.fetch.subprocess_concurrency = parse_number(value)?
            }
            "watch.enabled" => updated.watch.enabled = parse_bool(value)?,
            "watch.debounce_ms" => updated.watch.debounce_ms = parse_number(value)?,
            "watch.ignore_patterns" => {
                updated.watch.ignore_patterns = parse_list(value).map(str::to_string).collect()
            }
            "refresh.interval_secs" => updated.refresh.interval_secs = parse_number(value)?,
            "review.enabled" => updated.review.enabled = parse_bool(value)?,
            "review.limit" => updated.review.limit = parse_number(value)?,
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'vigil config list' to see available keys.",
                key
            ),
        }

        updated.validate().context("Invalid configuration value")?;
        *self = updated;
        Ok(())
    }
}

/// Every key accepted by [`SystemConfig::get`] and [`SystemConfig::set`]
pub const KEYS: &[&str] = &[
    "repos",
    "roots",
    "discover_depth",
    "fetch.debounce_ms",
    "fetch.status_ttl_secs",
    "fetch.review_ttl_secs",
    "fetch.subprocess_concurrency",
    "watch.enabled",
    "watch.debounce_ms",
    "watch.ignore_patterns",
    "refresh.interval_secs",
    "review.enabled",
    "review.limit",
];

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .ok()
        .context("Invalid value: must be a non-negative integer")
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .trim()
        .parse()
        .ok()
        .context("Invalid value: must be 'true' or 'false'")
}

/// Location of the config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vigil").join("config.toml"))
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load() -> Result<SystemConfig> {
    match config_file_path() {
        Some(path) => load_from(&path),
        None => Ok(SystemConfig::default()),
    }
}

/// Load a specific config file; a missing file means defaults.
pub fn load_from(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        return Ok(SystemConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    SystemConfig::from_toml(&contents).with_context(|| format!("In {}", path.display()))
}

/// Write `config` to the config file.
pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    save_to(config, &path)
}

pub fn save_to(config: &SystemConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Write the example config if no config file exists yet.
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, example_config())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    }
    Ok(path)
}

/// Commented example configuration with every default spelled out
pub fn example_config() -> &'static str {
    r#"# Vigil configuration

# Repositories shown on the dashboard
repos = []

# Directories scanned for repositories (up to discover_depth levels deep)
roots = []
discover_depth = 2

[fetch]
# Debounce for detail fetches when moving the selection (ms)
debounce_ms = 150
# How long git status results are reused (seconds)
status_ttl_secs = 5
# How long pull request lists are reused (seconds)
review_ttl_secs = 60
# Maximum git/gh processes running at once (1-64)
subprocess_concurrency = 4

[watch]
enabled = true
# Quiet period before a burst of repository changes is reported (ms)
debounce_ms = 300
# Extra gitignore-style patterns (relative to the git directory) to ignore
ignore_patterns = []

[refresh]
# Seconds between full refreshes (0 disables)
interval_secs = 30

[review]
enabled = true
limit = 20
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::from_toml("").unwrap();
        assert_eq!(config.discover_depth, 2);
        assert_eq!(config.fetch.debounce(), Duration::from_millis(150));
        assert_eq!(config.fetch.status_ttl(), Duration::from_secs(5));
        assert_eq!(config.fetch.review_ttl(), Duration::from_secs(60));
        assert_eq!(config.fetch.subprocess_concurrency, 4);
        assert!(config.watch.enabled);
        assert_eq!(config.watch.debounce_ms, 300);
        assert_eq!(config.refresh.interval(), Some(Duration::from_secs(30)));
        assert!(config.review.enabled);
        assert_eq!(config.review.limit, 20);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = SystemConfig::from_toml(example_config()).unwrap();
        assert_eq!(config, SystemConfig::from_toml("").unwrap());
    }

    #[test]
    fn test_partial_sections() {
        let config = SystemConfig::from_toml(
            r#"
            repos = ["~/src/app"]
            [fetch]
            subprocess_concurrency = 8
            [refresh]
            interval_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.repos, vec![PathBuf::from("~/src/app")]);
        assert_eq!(config.fetch.subprocess_concurrency, 8);
        assert_eq!(config.fetch.status_ttl_secs, 5);
        assert_eq!(config.refresh.interval(), None);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(SystemConfig::from_toml("[fetch]\nsubprocess_concurrency = 0").is_err());
        assert!(SystemConfig::from_toml("[fetch]\nsubprocess_concurrency = 65").is_err());
        assert!(SystemConfig::from_toml("[fetch]\ndebounce_ms = 10001").is_err());
        assert!(SystemConfig::from_toml("[watch]\ndebounce_ms = 20000").is_err());
        assert!(SystemConfig::from_toml("[fetch]\nstatus_ttl_secs = 86401").is_err());
        assert!(SystemConfig::from_toml("discover_depth = 0").is_err());
        assert!(SystemConfig::from_toml("discover_depth = 9").is_err());
        assert!(SystemConfig::from_toml("[review]\nlimit = 0").is_err());
    }

    #[test]
    fn test_get_and_set() {
        let mut config = SystemConfig::default();
        assert_eq!(config.get("fetch.subprocess_concurrency").unwrap(), "4");

        config.set("fetch.subprocess_concurrency", "16").unwrap();
        assert_eq!(config.fetch.subprocess_concurrency, 16);

        config.set("roots", "~/src, ~/work ,").unwrap();
        assert_eq!(config.get("roots").unwrap(), "~/src, ~/work");

        config.set("review.enabled", "false").unwrap();
        assert!(!config.review.enabled);

        assert!(config.get("nope").is_err());
        assert!(config.set("review.enabled", "maybe").is_err());
    }

    #[test]
    fn test_invalid_set_leaves_config_unchanged() {
        let mut config = SystemConfig::default();
        assert!(config.set("fetch.subprocess_concurrency", "0").is_err());
        assert_eq!(config.fetch.subprocess_concurrency, 4);
    }

    #[test]
    fn test_every_key_is_readable() {
        let config = SystemConfig::default();
        for key in KEYS {
            assert!(config.get(key).is_ok(), "{key}");
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        assert_eq!(load_from(&path).unwrap(), SystemConfig::default());

        let mut config = SystemConfig::default();
        config.set("repos", "/tmp/a,/tmp/b").unwrap();
        config.set("watch.ignore_patterns", "*.tmp").unwrap();
        save_to(&config, &path).unwrap();

        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_reports_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "repos = 3").unwrap();
        assert!(load_from(&path).is_err());
    }
}
