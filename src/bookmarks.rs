//! Named, ordered bookmarks with write-through persistence.

use std::sync::Arc;

use log::info;

use crate::error::Error;
use crate::store::Persistence;
use crate::types::Address;

/// A saved address with a display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    /// Where the bookmark points.
    pub address: Address,
    /// Display title. Need not be unique.
    pub title: String,
}

/// The bookmark list. The in-memory copy is authoritative; every mutation
/// is written through to persistence immediately.
pub struct BookmarkStore {
    /// Bookmarks in display order. Addresses are unique.
    entries: Vec<Bookmark>,
    /// Where mutations are flushed.
    persistence: Arc<dyn Persistence>,
}

impl BookmarkStore {
    /// Add a bookmark at the end. Returns `false` without writing if the
    /// address is already bookmarked.
    ///
    /// # Errors
    ///
    /// Returns persistence errors from the flush.
    pub fn add(&mut self, title: &str, address: Address) -> Result<bool, Error> {
        if self.contains(&address) {
            return Ok(false);
        }
        info!("bookmarked {address} as `{title}`");
        self.entries.push(Bookmark {
            address,
            title: title.to_string(),
        });
        self.flush()?;
        return Ok(true);
    }

    /// Whether `address` is bookmarked.
    pub fn contains(&self, address: &Address) -> bool {
        return self.entries.iter().any(|b| return b.address == *address);
    }

    /// Write the current list to persistence.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    fn flush(&self) -> Result<(), Error> {
        return self.persistence.save_bookmarks(&self.entries);
    }

    /// Whether there are no bookmarks.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Number of bookmarks.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Bookmarks in display order. Restartable and read-only.
    pub fn list(&self) -> std::slice::Iter<'_, Bookmark> {
        return self.entries.iter();
    }

    /// Read saved bookmarks. Duplicate addresses keep their first position.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub fn load(persistence: Arc<dyn Persistence>) -> Result<Self, Error> {
        let mut entries: Vec<Bookmark> = Vec::new();
        for bookmark in persistence.load_bookmarks()? {
            if !entries.iter().any(|b| return b.address == bookmark.address) {
                entries.push(bookmark);
            }
        }
        return Ok(Self { entries, persistence });
    }

    /// Move a bookmark to `index`, clamped to the end of the list.
    /// Returns `false` if the address is not bookmarked.
    ///
    /// # Errors
    ///
    /// Returns persistence errors from the flush.
    pub fn move_to(&mut self, address: &Address, index: usize) -> Result<bool, Error> {
        let Some(from) = self.position(address) else {
            return Ok(false);
        };
        let bookmark = self.entries.remove(from);
        let to = index.min(self.entries.len());
        self.entries.insert(to, bookmark);
        self.flush()?;
        return Ok(true);
    }

    /// Index of the bookmark for `address`.
    fn position(&self, address: &Address) -> Option<usize> {
        return self.entries.iter().position(|b| return b.address == *address);
    }

    /// Delete the bookmark for `address`. Returns `false` if absent.
    ///
    /// # Errors
    ///
    /// Returns persistence errors from the flush.
    pub fn remove(&mut self, address: &Address) -> Result<bool, Error> {
        let Some(index) = self.position(address) else {
            return Ok(false);
        };
        self.entries.remove(index);
        self.flush()?;
        return Ok(true);
    }

    /// Retitle the bookmark for `address`. Returns `false` if absent.
    ///
    /// # Errors
    ///
    /// Returns persistence errors from the flush.
    pub fn rename(&mut self, address: &Address, title: &str) -> Result<bool, Error> {
        let Some(bookmark) = self.entries.iter_mut().find(|b| return b.address == *address) else {
            return Ok(false);
        };
        title.clone_into(&mut bookmark.title);
        self.flush()?;
        return Ok(true);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::store::MemoryStore;

    fn path(p: &str) -> Address {
        return Address::LocalPath(PathBuf::from(p));
    }

    fn titles(store: &BookmarkStore) -> Vec<&str> {
        return store.list().map(|b| return b.title.as_str()).collect();
    }

    fn empty() -> (Arc<MemoryStore>, BookmarkStore) {
        let memory = Arc::new(MemoryStore::default());
        let store = BookmarkStore::load(Arc::clone(&memory) as Arc<dyn Persistence>).unwrap();
        return (memory, store);
    }

    #[test]
    fn adding_preserves_order_and_persists() {
        let (memory, mut store) = empty();

        assert!(store.add("A", path("/a.md")).unwrap());
        assert!(store.add("B", path("/b.md")).unwrap());

        assert_eq!(titles(&store), vec!["A", "B"]);
        assert_eq!(memory.load_bookmarks().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let (_, mut store) = empty();
        store.add("A", path("/a.md")).unwrap();

        assert!(!store.add("Again", path("/a.md")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_title_different_address_is_allowed() {
        let (_, mut store) = empty();
        store.add("Notes", path("/a.md")).unwrap();

        assert!(store.add("Notes", path("/b.md")).unwrap());
    }

    #[test]
    fn remove_and_rename_write_through() {
        let (memory, mut store) = empty();
        store.add("A", path("/a.md")).unwrap();
        store.add("B", path("/b.md")).unwrap();

        assert!(store.rename(&path("/b.md"), "Bee").unwrap());
        assert!(store.remove(&path("/a.md")).unwrap());
        assert!(!store.remove(&path("/zzz.md")).unwrap());

        let saved = memory.load_bookmarks().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.first().unwrap().title, "Bee");
    }

    #[test]
    fn move_to_reorders() {
        let (_, mut store) = empty();
        store.add("A", path("/a.md")).unwrap();
        store.add("B", path("/b.md")).unwrap();
        store.add("C", path("/c.md")).unwrap();

        store.move_to(&path("/c.md"), 0).unwrap();
        assert_eq!(titles(&store), vec!["C", "A", "B"]);

        store.move_to(&path("/c.md"), 99).unwrap();
        assert_eq!(titles(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn list_is_restartable() {
        let (_, mut store) = empty();
        store.add("A", path("/a.md")).unwrap();

        assert_eq!(store.list().count(), 1);
        assert_eq!(store.list().count(), 1);
    }
}
