use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// Upstream and layout constants
// =============================================================================

/// Default mirror for Alpine package indices
pub const DEFAULT_BASE_URL: &str = "http://dl-cdn.alpinelinux.org/alpine";

/// File name of the package index inside each upstream archive
pub const DEFAULT_INDEX_FILENAME: &str = "APKINDEX";

/// Branch name upstream uses for the newest stable release
pub const LATEST_STABLE_BRANCH: &str = "latest-stable";

/// Repository that only exists for development branches
pub const TESTING_REPOSITORY: &str = "testing";

/// Repositories every build file is checked against
pub const BASE_REPOSITORIES: [&str; 2] = ["main", "community"];

// =============================================================================
// Time-related constants
// =============================================================================

/// Default refresh interval in milliseconds (24 hours)
pub const DEFAULT_REFRESH_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Delay between starting each index download to avoid hammering the mirror (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

const APP_NAME: &str = "alpine-bump";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Base cache directory, `~` is expanded
    pub cache_dir: PathBuf,
    /// Directory name (not a path) below `cache_dir` holding the index databases
    pub db_dir: String,
    pub index: IndexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: cache_dir(),
            db_dir: "db".to_string(),
            index: IndexConfig::default(),
        }
    }
}

/// Which upstream indices are mirrored and where they come from
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexConfig {
    pub distro: String,
    pub base_url: String,
    pub index_filename: String,
    pub branches: Vec<String>,
    pub repositories: Vec<String>,
    pub architectures: Vec<String>,
    /// Age in milliseconds after which the local index is considered stale
    pub refresh_interval: i64,
    /// Upper bound for a whole rebuild, unlimited when absent
    pub deadline_secs: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            distro: "alpine".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            index_filename: DEFAULT_INDEX_FILENAME.to_string(),
            branches: strings(&[LATEST_STABLE_BRANCH, "edge"]),
            repositories: strings(&["main", "community", TESTING_REPOSITORY]),
            architectures: strings(&["aarch64", "armhf", "armv7", "x86", "x86_64"]),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
            deadline_secs: None,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Config {
    /// Load the config file at `path`, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {:?}, using defaults", path);
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.cache_dir = expand_home(&config.cache_dir, dirs::home_dir());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// `{cacheDir}/{dbDir}/{distro}`: root of the mirrored index tree
    pub fn index_root(&self) -> PathBuf {
        self.cache_dir.join(&self.db_dir).join(&self.index.distro)
    }
}

/// Returns the default cache directory for alpine-bump.
/// Uses $XDG_CACHE_HOME/alpine-bump if XDG_CACHE_HOME is set,
/// otherwise falls back to ~/.cache/alpine-bump,
/// or ./alpine-bump if neither is available.
pub fn cache_dir() -> PathBuf {
    dir_with_env(
        std::env::var("XDG_CACHE_HOME").ok(),
        dirs::home_dir(),
        ".cache",
    )
}

/// Returns the default config file path.
pub fn config_path() -> PathBuf {
    let dir = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    dir.join(format!("{APP_NAME}.json"))
}

fn dir_with_env(xdg_home: Option<String>, home_dir: Option<PathBuf>, fallback: &str) -> PathBuf {
    let base = xdg_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(fallback)))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_NAME)
}

fn expand_home(path: &Path, home_dir: Option<PathBuf>) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
