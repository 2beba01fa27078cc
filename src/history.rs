//! Browser-style back/forward history over visited documents.

use std::sync::Arc;

use crate::document::Document;
use crate::error::Error;
use crate::types::ResolvedLocation;

/// Default number of entries kept before the oldest are dropped.
pub const DEFAULT_LIMIT: usize = 256;

/// One visited document and where the reader was in it.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The document as it was when visited. Shared, never copied.
    document: Arc<Document>,
    /// Line the view was scrolled to.
    scroll_position: usize,
}

impl HistoryEntry {
    /// The visited document.
    pub const fn document(&self) -> &Arc<Document> {
        return &self.document;
    }

    /// Where the document was fetched from.
    pub fn location(&self) -> &ResolvedLocation {
        return self.document.location();
    }

    /// Saved scroll line.
    pub const fn scroll_position(&self) -> usize {
        return self.scroll_position;
    }
}

/// Ordered visit history with a cursor, as in a web browser.
///
/// Visiting from the middle of the stack discards everything after the
/// cursor. Back and forward only move the cursor, so revisited entries are
/// the same shared document, not a refetch.
#[derive(Debug)]
pub struct NavigationStack {
    /// Index of the displayed entry; `None` only when empty.
    cursor: Option<usize>,
    /// Visited entries, oldest first.
    entries: Vec<HistoryEntry>,
    /// Maximum entries retained.
    limit: usize,
}

impl Default for NavigationStack {
    fn default() -> Self {
        return Self::new(DEFAULT_LIMIT);
    }
}

impl NavigationStack {
    /// Move the cursor one step back.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoHistory` at the oldest entry or when empty.
    pub fn back(&mut self) -> Result<&HistoryEntry, Error> {
        let Some(cursor) = self.cursor.filter(|c| return *c > 0) else {
            return Err(Error::NoHistory);
        };
        self.cursor = Some(cursor.saturating_sub(1));
        return self.current();
    }

    /// Whether [`NavigationStack::back`] would succeed.
    pub fn can_go_back(&self) -> bool {
        return self.cursor.is_some_and(|c| return c > 0);
    }

    /// Whether [`NavigationStack::forward`] would succeed.
    pub fn can_go_forward(&self) -> bool {
        return self.cursor.is_some_and(|c| return c.saturating_add(1) < self.entries.len());
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// The displayed entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing has been visited.
    pub fn current(&self) -> Result<&HistoryEntry, Error> {
        return self
            .cursor
            .and_then(|c| return self.entries.get(c))
            .ok_or(Error::EmptyHistory);
    }

    /// Index of the displayed entry.
    pub const fn cursor(&self) -> Option<usize> {
        return self.cursor;
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> std::slice::Iter<'_, HistoryEntry> {
        return self.entries.iter();
    }

    /// Move the cursor one step forward.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoHistory` at the newest entry or when empty.
    pub fn forward(&mut self) -> Result<&HistoryEntry, Error> {
        let Some(cursor) = self.cursor.filter(|c| return c.saturating_add(1) < self.entries.len()) else {
            return Err(Error::NoHistory);
        };
        self.cursor = Some(cursor.saturating_add(1));
        return self.current();
    }

    /// Whether nothing has been visited.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Scroll the displayed entry to an anchor and return the line.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed and
    /// `Error::AnchorNotFound` when the document has no such anchor.
    pub fn jump_to_anchor(&mut self, anchor: &str) -> Result<usize, Error> {
        let entry = self
            .cursor
            .and_then(|c| return self.entries.get_mut(c))
            .ok_or(Error::EmptyHistory)?;
        let Some(target) = entry.document.find_anchor(anchor) else {
            return Err(Error::AnchorNotFound {
                anchor: anchor.to_string(),
                location: entry.document.location().clone(),
            });
        };
        entry.scroll_position = target.line;
        return Ok(target.line);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Locations of every entry, oldest first.
    pub fn locations(&self) -> Vec<ResolvedLocation> {
        return self.entries.iter().map(|e| return e.location().clone()).collect();
    }

    /// Create an empty stack retaining at most `limit` entries (minimum 1).
    pub fn new(limit: usize) -> Self {
        return Self {
            cursor: None,
            entries: Vec::new(),
            limit: limit.max(1),
        };
    }

    /// Remove the entry at `index`.
    ///
    /// The cursor keeps pointing at the same entry when it survives. If the
    /// displayed entry is removed, the one that took its place becomes
    /// current, or the new last entry if it was at the end.
    ///
    /// # Errors
    ///
    /// Returns `Error::HistoryIndex` when `index` is out of range.
    pub fn remove(&mut self, index: usize) -> Result<HistoryEntry, Error> {
        if index >= self.entries.len() {
            return Err(Error::HistoryIndex {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        let len = self.entries.len();
        self.cursor = match self.cursor {
            _ if len == 0 => None,
            Some(c) if index < c => Some(c.saturating_sub(1)),
            Some(c) => Some(c.min(len.saturating_sub(1))),
            None => None,
        };
        return Ok(removed);
    }

    /// Swap in a freshly fetched document for the displayed entry, keeping
    /// its scroll position.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed.
    pub fn replace_current(&mut self, document: Arc<Document>) -> Result<&HistoryEntry, Error> {
        let entry = self
            .cursor
            .and_then(|c| return self.entries.get_mut(c))
            .ok_or(Error::EmptyHistory)?;
        entry.document = document;
        return Ok(entry);
    }

    /// Record the scroll line of the displayed entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed.
    pub fn set_scroll(&mut self, line: usize) -> Result<(), Error> {
        let entry = self
            .cursor
            .and_then(|c| return self.entries.get_mut(c))
            .ok_or(Error::EmptyHistory)?;
        entry.scroll_position = line;
        return Ok(());
    }

    /// Append a document after the cursor, discarding any forward entries,
    /// and make it current. The oldest entries are dropped past the limit.
    pub fn visit(&mut self, document: Arc<Document>) {
        let keep = self.cursor.map_or(0, |c| return c.saturating_add(1));
        self.entries.truncate(keep);
        self.entries.push(HistoryEntry {
            document,
            scroll_position: 0,
        });
        if self.entries.len() > self.limit {
            let excess = self.entries.len().saturating_sub(self.limit);
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len().saturating_sub(1));
    }
}
