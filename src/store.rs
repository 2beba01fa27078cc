//! Durable storage for history and bookmarks.
//!
//! Two JSON files live in the data directory: `history.json`, a list of
//! location strings, and `bookmarks.json`, a list of `[title, address]`
//! pairs. A missing file reads as empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::address;
use crate::bookmarks::Bookmark;
use crate::config::Config;
use crate::error::Error;
use crate::types::ResolvedLocation;

/// File name for persisted history.
pub const HISTORY_FILE: &str = "history.json";

/// File name for persisted bookmarks.
pub const BOOKMARKS_FILE: &str = "bookmarks.json";

/// Load and save navigation state. Injected so tests run without a disk.
pub trait Persistence: Send + Sync {
    /// Read saved bookmarks, in display order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` when stored state cannot be read.
    fn load_bookmarks(&self) -> Result<Vec<Bookmark>, Error>;

    /// Read saved history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` when stored state cannot be read.
    fn load_history(&self) -> Result<Vec<ResolvedLocation>, Error>;

    /// Replace saved bookmarks.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` when state cannot be written.
    fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<(), Error>;

    /// Replace saved history.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` when state cannot be written.
    fn save_history(&self, history: &[ResolvedLocation]) -> Result<(), Error>;
}

/// [`Persistence`] backed by JSON files in a directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    /// Directory holding both files. Created on first write.
    dir: PathBuf,
}

impl JsonStore {
    /// Path of the bookmarks file.
    pub fn bookmarks_path(&self) -> PathBuf {
        return self.dir.join(BOOKMARKS_FILE);
    }

    /// Path of the history file.
    pub fn history_path(&self) -> PathBuf {
        return self.dir.join(HISTORY_FILE);
    }

    /// Store state under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        return Self { dir: dir.into() };
    }
}

/// Read and decode a JSON file. A missing file yields the default value.
///
/// # Errors
///
/// Returns `Error::Io` for read failures other than not-found,
/// or `Error::Json` if the content is malformed.
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, Error> {
    let content = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found, starting empty", path.display());
            return Ok(T::default());
        },
        Err(e) => return Err(Error::Io(e)),
        Ok(c) => c,
    };
    return Ok(serde_json::from_str(&content)?);
}

/// Encode and write a JSON file, creating parent directories.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails,
/// or `Error::Io` if the file cannot be written.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    return Ok(());
}

impl Persistence for JsonStore {
    fn load_bookmarks(&self) -> Result<Vec<Bookmark>, Error> {
        let records: Vec<(String, String)> = read_json(&self.bookmarks_path())?;
        let bookmarks = records
            .into_iter()
            .filter_map(|(title, raw)| {
                return match address::resolve(&raw, None) {
                    Ok(address) => Some(Bookmark { address, title }),
                    Err(e) => {
                        warn!("skipping bookmark `{title}`: {e}");
                        None
                    },
                };
            })
            .collect();
        return Ok(bookmarks);
    }

    fn load_history(&self) -> Result<Vec<ResolvedLocation>, Error> {
        let records: Vec<String> = read_json(&self.history_path())?;
        return Ok(records.iter().map(|r| return ResolvedLocation::parse(r)).collect());
    }

    fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<(), Error> {
        let records: Vec<(&str, String)> = bookmarks
            .iter()
            .map(|b| return (b.title.as_str(), b.address.to_string()))
            .collect();
        return write_json(&self.bookmarks_path(), &records);
    }

    fn save_history(&self, history: &[ResolvedLocation]) -> Result<(), Error> {
        let records: Vec<String> = history.iter().map(ToString::to_string).collect();
        return write_json(&self.history_path(), &records);
    }
}

/// The configured store: JSON files in the data directory, or memory when
/// no data directory can be determined.
pub fn open(config: &Config) -> Arc<dyn Persistence> {
    return match config.storage_dir() {
        Some(dir) => Arc::new(JsonStore::new(dir)),
        None => {
            warn!("no data directory available, history and bookmarks will not be saved");
            Arc::new(MemoryStore::default())
        },
    };
}

/// In-memory [`Persistence`] for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Saved bookmarks.
    bookmarks: Mutex<Vec<Bookmark>>,
    /// Saved history.
    history: Mutex<Vec<ResolvedLocation>>,
}

impl MemoryStore {
    /// Start with the given saved history.
    pub fn with_history(history: Vec<ResolvedLocation>) -> Self {
        return Self {
            bookmarks: Mutex::default(),
            history: Mutex::new(history),
        };
    }
}

impl Persistence for MemoryStore {
    fn load_bookmarks(&self) -> Result<Vec<Bookmark>, Error> {
        return Ok(self.bookmarks.lock().clone());
    }

    fn load_history(&self) -> Result<Vec<ResolvedLocation>, Error> {
        return Ok(self.history.lock().clone());
    }

    fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<(), Error> {
        bookmarks.clone_into(&mut self.bookmarks.lock());
        return Ok(());
    }

    fn save_history(&self, history: &[ResolvedLocation]) -> Result<(), Error> {
        history.clone_into(&mut self.history.lock());
        return Ok(());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        assert!(store.load_history().unwrap().is_empty());
        assert!(store.load_bookmarks().unwrap().is_empty());
    }

    #[test]
    fn history_is_a_list_of_strings() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested"));
        let history = vec![
            ResolvedLocation::parse("/docs/a.md"),
            ResolvedLocation::parse("https://example.com/b.md"),
        ];

        store.save_history(&history).unwrap();

        let raw = std::fs::read_to_string(store.history_path()).unwrap();
        let strings: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(strings, vec!["/docs/a.md", "https://example.com/b.md"]);
        assert_eq!(store.load_history().unwrap(), history);
    }

    #[test]
    fn bookmarks_are_title_address_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(
            store.bookmarks_path(),
            r#"[["Guide", "/docs/guide.md"], ["Repo", "gh foo/bar"], ["Broken", "ftp://x/y"]]"#,
        )
        .unwrap();

        let bookmarks = store.load_bookmarks().unwrap();

        assert_eq!(bookmarks.len(), 2);
        assert_eq!(bookmarks[0].title, "Guide");
        assert!(matches!(bookmarks[1].address, Address::Forge(_)));
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::write(store.history_path(), "{not json").unwrap();

        assert!(matches!(store.load_history(), Err(Error::Json(_))));
    }
}
