use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::history;

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "MDNAV_DATA_DIR";

/// Application configuration loaded from `config.toml`.
/// Every key is optional; absent keys take their defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Branches probed, in order, when forge shorthand names none.
    pub branch_candidates: Vec<String>,
    /// Remote documents kept in the fetch cache.
    pub cache_capacity: usize,
    /// Where history and bookmarks are stored. Supports `~`.
    pub data_dir: Option<PathBuf>,
    /// File extensions treated as markdown, with the leading dot.
    pub markdown_extensions: Vec<String>,
    /// History entries kept, in memory and on disk.
    pub max_history: usize,
    /// Ask the forge API for the default branch after the candidates fail.
    pub query_forge_api: bool,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// `User-Agent` sent with HTTP requests.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            branch_candidates: vec!["main".to_string(), "master".to_string()],
            cache_capacity: 32,
            data_dir: None,
            markdown_extensions: vec![".md".to_string(), ".markdown".to_string()],
            max_history: history::DEFAULT_LIMIT,
            query_forge_api: true,
            timeout_secs: 10,
            user_agent: concat!("mdnav/", env!("CARGO_PKG_VERSION")).to_string(),
        };
    }
}

impl Config {
    /// Directory for history and bookmarks.
    ///
    /// `MDNAV_DATA_DIR` wins, then `data_dir` from the config file, then
    /// `$XDG_DATA_HOME/mdnav`, then `~/.local/share/mdnav`. `None` only
    /// when no home directory can be found.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| return !d.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        if let Some(dir) = &self.data_dir {
            let raw = dir.to_string_lossy();
            return Some(PathBuf::from(shellexpand::tilde(&raw).as_ref()));
        }
        return xdg_dir("XDG_DATA_HOME", ".local/share");
    }

    /// Default config file location: `$XDG_CONFIG_HOME/mdnav/config.toml`,
    /// falling back to `~/.config/mdnav/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        return xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| return d.join("config.toml"));
    }

    /// Whether `path` has one of the configured markdown extensions.
    pub fn is_markdown(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| return n.to_string_lossy().to_lowercase()) else {
            return false;
        };
        return self
            .markdown_extensions
            .iter()
            .any(|ext| return name.ends_with(&ext.to_lowercase()) && name.len() > ext.len());
    }

    /// Load configuration.
    ///
    /// An explicitly named file must exist. The default location may be
    /// absent, giving defaults. A file that exists but is malformed is always
    /// an error: a config the user wrote is never silently ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if an explicit path does not exist,
    /// `Error::Io` if reading fails, or `Error::TomlDe` if the TOML is malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && required => {
                return Err(Error::ConfigNotFound { path });
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
        };
        debug!("loaded config from {}", path.display());
        return Self::parse(&content);
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or a key has the wrong type.
    pub fn parse(content: &str) -> Result<Self, Error> {
        return Ok(toml::from_str(content)?);
    }

    /// HTTP timeout as a duration.
    pub const fn timeout(&self) -> Duration {
        return Duration::from_secs(self.timeout_secs);
    }
}

/// `$<var>/mdnav`, or `~/<fallback>/mdnav` when the variable is unset.
fn xdg_dir(var: &str, fallback: &str) -> Option<PathBuf> {
    if let Some(base) = std::env::var_os(var).filter(|b| return !b.is_empty()) {
        return Some(PathBuf::from(base).join("mdnav"));
    }
    let home = std::env::var_os("HOME").filter(|h| return !h.is_empty())?;
    return Some(PathBuf::from(home).join(fallback).join("mdnav"));
}
