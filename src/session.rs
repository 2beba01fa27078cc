//! A browsing session: the navigation stack, bookmarks, and the load
//! pipeline wired together, with history written through to persistence.

use std::sync::Arc;

use log::{info, warn};

use crate::address;
use crate::bookmarks::BookmarkStore;
use crate::config::Config;
use crate::document::Document;
use crate::error::Error;
use crate::fetch::{HttpTransport, Transport};
use crate::history::{HistoryEntry, NavigationStack};
use crate::loader::{Loaded, Loader, Pipeline, Ticket};
use crate::store::{self, Persistence};
use crate::types::{Address, Link, ResolvedLocation};

/// What a synchronous navigation did.
#[derive(Debug)]
pub enum Navigation {
    /// Scrolled within the current document.
    Jumped {
        /// Line now at the top of the view.
        line: usize,
    },
    /// A new document was fetched and is now current.
    Visited(Arc<Document>),
}

/// What an asynchronous navigation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Scrolled within the current document; nothing to wait for.
    Jumped {
        /// Line now at the top of the view.
        line: usize,
    },
    /// A load is in flight. Pass its result to [`Session::accept`].
    Pending(Ticket),
}

/// One reader's browsing state.
pub struct Session {
    /// Saved bookmarks.
    bookmarks: BookmarkStore,
    /// Background loads.
    loader: Loader,
    /// Cap on persisted history.
    max_history: usize,
    /// Where history is written.
    persistence: Arc<dyn Persistence>,
    /// History from earlier sessions, oldest first.
    prior: Vec<ResolvedLocation>,
    /// This session's back/forward stack.
    stack: NavigationStack,
}

impl Session {
    /// Apply a finished background load. Stale results are dropped and
    /// yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the load's own error when it is the current request.
    pub fn accept(&mut self, loaded: Loaded) -> Result<Option<Arc<Document>>, Error> {
        if !self.loader.is_current(loaded.ticket) {
            return Ok(None);
        }
        let document = loaded.result?;
        self.record(Arc::clone(&document), loaded.fragment.as_deref());
        return Ok(Some(document));
    }

    /// Step back in history.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoHistory` at the oldest entry.
    pub fn back(&mut self) -> Result<Arc<Document>, Error> {
        self.loader.cancel();
        return self.stack.back().map(|e| return Arc::clone(e.document()));
    }

    /// Bookmark the displayed document. The title defaults to its file name.
    /// Returns `false` if it was already bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed, or
    /// persistence errors.
    pub fn bookmark_current(&mut self, title: Option<&str>) -> Result<bool, Error> {
        let location = self.stack.current()?.location().clone();
        let title = title.map_or_else(|| return location.file_name(), String::from);
        return self.bookmarks.add(&title, location.to_address());
    }

    /// Saved bookmarks.
    pub const fn bookmarks(&self) -> &BookmarkStore {
        return &self.bookmarks;
    }

    /// Saved bookmarks, for editing.
    pub const fn bookmarks_mut(&mut self) -> &mut BookmarkStore {
        return &mut self.bookmarks;
    }

    /// Forget all history, past sessions included.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub fn clear_history(&mut self) -> Result<(), Error> {
        self.loader.cancel();
        self.prior.clear();
        self.stack.clear();
        return self.persistence.save_history(&[]);
    }

    /// The displayed entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed.
    pub fn current(&self) -> Result<&HistoryEntry, Error> {
        return self.stack.current();
    }

    /// Location of the displayed document, if any.
    fn current_location(&self) -> Option<ResolvedLocation> {
        return self.stack.current().ok().map(|e| return e.location().clone());
    }

    /// Follow a link found in the displayed document.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed, or any
    /// resolution, fetch, or parse error. History is unchanged on error.
    pub fn follow(&mut self, href: &str) -> Result<Navigation, Error> {
        let link = self.link(href)?;
        return self.go(&link.address, link.fragment.as_deref());
    }

    /// Step forward in history.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoHistory` at the newest entry.
    pub fn forward(&mut self) -> Result<Arc<Document>, Error> {
        self.loader.cancel();
        return self.stack.forward().map(|e| return Arc::clone(e.document()));
    }

    /// Load and visit an address synchronously. Any background load still
    /// in flight is abandoned.
    ///
    /// # Errors
    ///
    /// Returns resolution, fetch, parse, or anchor errors.
    fn go(&mut self, address: &Address, fragment: Option<&str>) -> Result<Navigation, Error> {
        self.loader.cancel();
        if let Address::Anchor(id) = address {
            let line = self.jump(id)?;
            return Ok(Navigation::Jumped { line });
        }
        let document = Arc::new(self.loader.pipeline().load_address(address)?);
        self.record(Arc::clone(&document), fragment);
        return Ok(Navigation::Visited(document));
    }

    /// This session's navigation stack.
    pub const fn history(&self) -> &NavigationStack {
        return &self.stack;
    }

    /// Scroll the displayed document to an anchor.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` or `Error::AnchorNotFound`.
    pub fn jump(&mut self, anchor: &str) -> Result<usize, Error> {
        self.loader.cancel();
        return self.stack.jump_to_anchor(anchor);
    }

    /// Resolve a link against the displayed document.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed, or
    /// `Error::InvalidAddress`.
    fn link(&self, href: &str) -> Result<Link, Error> {
        let current = self.current_location().ok_or(Error::EmptyHistory)?;
        return address::resolve_link(href, &current);
    }

    /// The background loader, for receiving finished requests.
    pub const fn loader(&self) -> &Loader {
        return &self.loader;
    }

    /// Resolve typed input and visit it synchronously. A trailing
    /// `#fragment` scrolls the new document to that heading.
    ///
    /// # Errors
    ///
    /// Returns resolution, fetch, parse, or anchor errors. History is
    /// unchanged on error.
    pub fn navigate(&mut self, input: &str) -> Result<Navigation, Error> {
        let (target, fragment) = address::split_input(input);
        let address = address::resolve(target, self.current_location().as_ref())?;
        return self.go(&address, fragment);
    }

    /// Build a session from injected collaborators.
    ///
    /// # Errors
    ///
    /// Returns persistence errors while loading saved state.
    pub fn new(config: &Config, transport: &Arc<dyn Transport>, persistence: Arc<dyn Persistence>) -> Result<Self, Error> {
        let bookmarks = BookmarkStore::load(Arc::clone(&persistence))?;
        let prior = persistence.load_history()?;
        return Ok(Self {
            bookmarks,
            loader: Loader::new(Pipeline::new(transport, config)),
            max_history: config.max_history.max(1),
            persistence,
            prior,
            stack: NavigationStack::new(config.max_history),
        });
    }

    /// Build a session over real HTTP and the on-disk store.
    ///
    /// # Errors
    ///
    /// Returns transport setup or persistence errors.
    pub fn open(config: &Config) -> Result<Self, Error> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.timeout(), &config.user_agent)?);
        return Self::new(config, &transport, store::open(config));
    }

    /// History as persisted: earlier sessions then this one, capped.
    pub fn persisted_history(&self) -> Vec<ResolvedLocation> {
        let mut all = self.prior.clone();
        all.extend(self.stack.locations());
        let excess = all.len().saturating_sub(self.max_history);
        all.drain(..excess);
        return all;
    }

    /// Push a loaded document, save history, and jump to `fragment`.
    /// Save and jump failures are logged, not returned: the visit happened.
    fn record(&mut self, document: Arc<Document>, fragment: Option<&str>) {
        info!("visited {}", document.location());
        self.stack.visit(document);
        if let Err(e) = self.persistence.save_history(&self.persisted_history()) {
            warn!("could not save history: {e}");
        }
        if let Some(anchor) = fragment
            && let Err(e) = self.stack.jump_to_anchor(anchor)
        {
            warn!("{e}");
        }
    }

    /// Refetch the displayed document, bypassing the cache. The history
    /// entry is updated in place and its scroll position kept.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed, or fetch and
    /// parse errors, in which case the old document stays.
    pub fn reload(&mut self) -> Result<Arc<Document>, Error> {
        self.loader.cancel();
        let location = self.current_location().ok_or(Error::EmptyHistory)?;
        let document = Arc::new(self.loader.pipeline().load(&location, true)?);
        self.stack.replace_current(Arc::clone(&document))?;
        return Ok(document);
    }

    /// Remove an entry from this session's stack and save.
    ///
    /// # Errors
    ///
    /// Returns `Error::HistoryIndex` or persistence errors.
    pub fn remove_history(&mut self, index: usize) -> Result<(), Error> {
        self.loader.cancel();
        self.stack.remove(index)?;
        return self.persistence.save_history(&self.persisted_history());
    }

    /// Resolve typed input and start loading it in the background. A
    /// trailing `#fragment` is applied once the load is accepted.
    ///
    /// # Errors
    ///
    /// Returns resolution or anchor errors. Load errors arrive via [`Session::accept`].
    pub fn request(&mut self, input: &str) -> Result<Request, Error> {
        let (target, fragment) = address::split_input(input);
        let address = address::resolve(target, self.current_location().as_ref())?;
        return self.start(address, fragment.map(String::from));
    }

    /// Resolve a link and start loading it in the background.
    ///
    /// # Errors
    ///
    /// Same as [`Session::request`].
    pub fn request_link(&mut self, href: &str) -> Result<Request, Error> {
        let link = self.link(href)?;
        return self.start(link.address, link.fragment);
    }

    /// Reopen the most recent location from an earlier session.
    /// `Ok(None)` when there is no saved history.
    ///
    /// # Errors
    ///
    /// Returns fetch or parse errors; saved history is left intact.
    pub fn restore(&mut self) -> Result<Option<Arc<Document>>, Error> {
        self.loader.cancel();
        let Some(last) = self.prior.pop() else {
            return Ok(None);
        };
        match self.loader.pipeline().load(&last, false) {
            Ok(document) => {
                let document = Arc::new(document);
                self.record(Arc::clone(&document), None);
                return Ok(Some(document));
            },
            Err(e) => {
                self.prior.push(last);
                return Err(e);
            },
        }
    }

    /// Record how far the displayed document is scrolled.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyHistory` when nothing is displayed.
    pub fn set_scroll(&mut self, line: usize) -> Result<(), Error> {
        return self.stack.set_scroll(line);
    }

    /// Jump immediately for anchors, otherwise hand off to the loader.
    ///
    /// # Errors
    ///
    /// Returns anchor errors.
    fn start(&mut self, address: Address, fragment: Option<String>) -> Result<Request, Error> {
        if let Address::Anchor(id) = &address {
            let line = self.jump(id)?;
            return Ok(Request::Jumped { line });
        }
        return Ok(Request::Pending(self.loader.request(address, fragment)));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::indexing_slicing, reason = "tests")]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::ScriptedTransport;

    const REMOTE: &str = "https://example.com/repo/README.md";

    struct Fixture {
        _dir: tempfile::TempDir,
        memory: Arc<MemoryStore>,
        root: std::path::PathBuf,
        session: Session,
        transport: Arc<ScriptedTransport>,
    }

    fn fixture(prior: Vec<ResolvedLocation>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("index.md"), "# Index\n\n## Setup\n\nSee [other](other.md).\n").unwrap();
        std::fs::write(root.join("other.md"), "# Other\n\nintro\n\n## Details\n").unwrap();

        let transport = Arc::new(
            ScriptedTransport::default()
                .with(REMOTE, 200, "# Remote\n\n## Install\n")
                .with("https://example.com/repo/docs/guide.md", 200, "# Guide\n"),
        );
        let memory = Arc::new(MemoryStore::with_history(prior));
        let dyn_transport: Arc<dyn Transport> = Arc::clone(&transport) as Arc<dyn Transport>;
        let session = Session::new(&Config::default(), &dyn_transport, Arc::clone(&memory) as Arc<dyn Persistence>).unwrap();
        return Fixture {
            _dir: dir,
            memory,
            root,
            session,
            transport,
        };
    }

    fn path_str(root: &Path, name: &str) -> String {
        return root.join(name).to_string_lossy().into_owned();
    }

    fn visited(nav: Navigation) -> Arc<Document> {
        match nav {
            Navigation::Visited(d) => return d,
            Navigation::Jumped { .. } => panic!("expected a visit"),
        }
    }

    #[test]
    fn navigate_visits_and_persists() {
        let mut f = fixture(Vec::new());

        let doc = visited(f.session.navigate(&path_str(&f.root, "index.md")).unwrap());

        assert_eq!(doc.title(), "Index");
        assert_eq!(f.session.history().len(), 1);
        assert_eq!(f.memory.load_history().unwrap(), vec![doc.location().clone()]);
    }

    #[test]
    fn failed_navigation_leaves_history_unchanged() {
        let mut f = fixture(Vec::new());
        f.session.navigate(&path_str(&f.root, "index.md")).unwrap();

        let err = f.session.navigate(&path_str(&f.root, "missing.md")).unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(f.session.history().len(), 1);
        assert_eq!(f.session.current().unwrap().location().file_name(), "index.md");
    }

    #[test]
    fn following_a_relative_link_then_back() {
        let mut f = fixture(Vec::new());
        let index = visited(f.session.navigate(&path_str(&f.root, "index.md")).unwrap());

        f.session.follow("other.md#details").unwrap();
        assert_eq!(f.session.current().unwrap().location().file_name(), "other.md");
        assert_eq!(f.session.current().unwrap().scroll_position(), 4);

        let back = f.session.back().unwrap();
        assert!(Arc::ptr_eq(&back, &index));
    }

    #[test]
    fn anchor_input_jumps_without_visiting() {
        let mut f = fixture(Vec::new());
        f.session.navigate(&path_str(&f.root, "index.md")).unwrap();

        let nav = f.session.navigate("#setup").unwrap();

        assert!(matches!(nav, Navigation::Jumped { line: 2 }));
        assert_eq!(f.session.history().len(), 1);
    }

    #[test]
    fn remote_links_join_the_document_url() {
        let mut f = fixture(Vec::new());
        f.session.navigate(REMOTE).unwrap();

        f.session.follow("docs/guide.md").unwrap();

        assert_eq!(
            f.session.current().unwrap().location().to_string(),
            "https://example.com/repo/docs/guide.md"
        );
    }

    #[test]
    fn reload_refetches_and_keeps_scroll() {
        let mut f = fixture(Vec::new());
        f.session.navigate(REMOTE).unwrap();
        f.session.set_scroll(3).unwrap();

        f.session.reload().unwrap();

        assert_eq!(f.transport.gets(REMOTE), 2);
        assert_eq!(f.session.history().len(), 1);
        assert_eq!(f.session.current().unwrap().scroll_position(), 3);
    }

    #[test]
    fn revisiting_uses_the_cache() {
        let mut f = fixture(Vec::new());
        f.session.navigate(REMOTE).unwrap();
        f.session.navigate(REMOTE).unwrap();

        assert_eq!(f.transport.gets(REMOTE), 1);
        assert_eq!(f.session.history().len(), 2);
    }

    #[test]
    fn bookmark_current_uses_file_name() {
        let mut f = fixture(Vec::new());
        f.session.navigate(&path_str(&f.root, "index.md")).unwrap();

        assert!(f.session.bookmark_current(None).unwrap());
        assert!(!f.session.bookmark_current(Some("again")).unwrap());
        assert_eq!(f.session.bookmarks().list().next().unwrap().title, "index.md");
    }

    #[test]
    fn bookmarking_with_nothing_displayed_fails() {
        let mut f = fixture(Vec::new());

        assert!(matches!(f.session.bookmark_current(None), Err(Error::EmptyHistory)));
    }

    #[test]
    fn restore_reopens_last_saved_location() {
        let f0 = fixture(Vec::new());
        let saved = ResolvedLocation::Local(f0.root.join("other.md"));
        let mut f = Fixture {
            session: Session::new(
                &Config::default(),
                &(Arc::clone(&f0.transport) as Arc<dyn Transport>),
                Arc::new(MemoryStore::with_history(vec![saved.clone()])),
            )
            .unwrap(),
            ..f0
        };

        let doc = f.session.restore().unwrap().unwrap();

        assert_eq!(doc.location(), &saved);
        assert_eq!(f.session.persisted_history(), vec![saved]);
    }

    #[test]
    fn persisted_history_keeps_prior_sessions() {
        let earlier = ResolvedLocation::parse("/old/notes.md");
        let mut f = fixture(vec![earlier.clone()]);

        f.session.navigate(REMOTE).unwrap();

        let saved = f.memory.load_history().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0], earlier);
    }

    #[test]
    fn clear_history_forgets_everything() {
        let mut f = fixture(vec![ResolvedLocation::parse("/old/notes.md")]);
        f.session.navigate(REMOTE).unwrap();

        f.session.clear_history().unwrap();

        assert!(f.session.history().is_empty());
        assert!(f.memory.load_history().unwrap().is_empty());
    }

    #[test]
    fn background_request_is_accepted() {
        let mut f = fixture(Vec::new());

        let Request::Pending(ticket) = f.session.request(REMOTE).unwrap() else {
            panic!("expected a pending load");
        };
        let loaded = f.session.loader().recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(loaded.ticket, ticket);

        let doc = f.session.accept(loaded).unwrap().unwrap();
        assert_eq!(doc.title(), "Remote");
        assert_eq!(f.session.history().len(), 1);
    }

    #[test]
    fn superseded_results_are_dropped() {
        let mut f = fixture(Vec::new());
        f.session.request(REMOTE).unwrap();
        let stale = Loaded {
            fragment: None,
            result: Err(Error::NoHistory),
            ticket: match f.session.request(REMOTE).unwrap() {
                Request::Pending(t) => t,
                Request::Jumped { .. } => panic!("expected a pending load"),
            },
        };
        f.session.loader().cancel();

        assert!(f.session.accept(stale).unwrap().is_none());
        assert!(f.session.history().is_empty());
    }

    #[test]
    fn moving_in_history_abandons_pending_load() {
        let mut f = fixture(Vec::new());
        f.session.navigate(&path_str(&f.root, "index.md")).unwrap();
        f.session.navigate(&path_str(&f.root, "other.md")).unwrap();
        let Request::Pending(ticket) = f.session.request(REMOTE).unwrap() else {
            panic!("expected a pending load");
        };
        f.session.back().unwrap();

        let remote = ResolvedLocation::Remote(url::Url::parse(REMOTE).unwrap());
        let late = Loaded {
            fragment: None,
            result: Ok(Arc::new(f.session.loader().pipeline().load(&remote, false).unwrap())),
            ticket,
        };

        assert!(f.session.accept(late).unwrap().is_none());
        assert_eq!(f.session.history().len(), 2);
        assert_eq!(f.session.history().cursor(), Some(0));
        assert_eq!(f.session.current().unwrap().document().title(), "Index");
    }

    #[test]
    fn jump_and_reload_abandon_pending_load() {
        let mut f = fixture(Vec::new());
        f.session.navigate(&path_str(&f.root, "index.md")).unwrap();

        let Request::Pending(first) = f.session.request(REMOTE).unwrap() else {
            panic!("expected a pending load");
        };
        f.session.jump("setup").unwrap();
        assert!(!f.session.loader().is_current(first));

        let Request::Pending(second) = f.session.request(REMOTE).unwrap() else {
            panic!("expected a pending load");
        };
        f.session.reload().unwrap();
        assert!(!f.session.loader().is_current(second));
    }

    #[test]
    fn typed_fragment_scrolls_the_new_document() {
        let mut f = fixture(Vec::new());

        let doc = visited(f.session.navigate(&format!("{}#setup", path_str(&f.root, "index.md"))).unwrap());

        assert_eq!(doc.title(), "Index");
        assert_eq!(f.session.current().unwrap().scroll_position(), 2);
    }

    #[test]
    fn requested_fragment_travels_with_the_load() {
        let mut f = fixture(Vec::new());

        let Request::Pending(ticket) = f.session.request(&format!("{REMOTE}#install")).unwrap() else {
            panic!("expected a pending load");
        };
        let loaded = f.session.loader().recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(loaded.ticket, ticket);
        assert_eq!(loaded.fragment.as_deref(), Some("install"));
        f.session.accept(loaded).unwrap().unwrap();
        assert_eq!(f.session.current().unwrap().scroll_position(), 2);
    }
}
