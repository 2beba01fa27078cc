//! The fetch-and-parse pipeline, and a background loader that runs it off
//! the caller's thread.
//!
//! Each request gets a ticket. Only the newest ticket's result is ever
//! applied; older results are dropped so a slow fetch cannot overwrite a
//! newer navigation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::config::Config;
use crate::document::Document;
use crate::error::Error;
use crate::fetch::{Fetcher, Transport};
use crate::forge::ForgeResolver;
use crate::types::{Address, ResolvedLocation};

/// Address to document: forge expansion, fetch, parse.
#[derive(Clone)]
pub struct Pipeline {
    /// Byte retrieval with remote caching.
    fetcher: Arc<Fetcher>,
    /// Forge shorthand expansion.
    forges: Arc<ForgeResolver>,
}

impl Pipeline {
    /// Fetch and parse a concrete location. `fresh` bypasses the cache.
    ///
    /// # Errors
    ///
    /// Returns fetch errors or `Error::ParseFailed`.
    pub fn load(&self, location: &ResolvedLocation, fresh: bool) -> Result<Document, Error> {
        let bytes = if fresh {
            self.fetcher.fetch_fresh(location)?
        } else {
            self.fetcher.fetch(location)?
        };
        debug!("fetched {} bytes from {location}", bytes.len());
        return Document::build(location.clone(), &bytes);
    }

    /// Locate, fetch, and parse an address.
    ///
    /// # Errors
    ///
    /// Returns errors from [`Pipeline::locate`] and [`Pipeline::load`].
    pub fn load_address(&self, address: &Address) -> Result<Document, Error> {
        let location = self.locate(address)?;
        return self.load(&location, false);
    }

    /// Turn an address into a fetchable location, expanding forge shorthand.
    ///
    /// # Errors
    ///
    /// Returns forge expansion errors, or `Error::InvalidAddress` for an
    /// anchor, which has no location of its own.
    pub fn locate(&self, address: &Address) -> Result<ResolvedLocation, Error> {
        return match address {
            Address::Anchor(id) => Err(Error::invalid(&format!("#{id}"), "anchors are resolved in the current document")),
            Address::Forge(shorthand) => self.forges.expand(shorthand),
            Address::LocalPath(path) => Ok(ResolvedLocation::Local(path.clone())),
            Address::RemoteUrl(url) => Ok(ResolvedLocation::Remote(url.clone())),
        };
    }

    /// Build a pipeline over `transport` using the configured branch
    /// candidates and cache size.
    pub fn new(transport: &Arc<dyn Transport>, config: &Config) -> Self {
        let forges = ForgeResolver::new(
            Arc::clone(transport),
            config.branch_candidates.clone(),
            config.query_forge_api,
        );
        return Self {
            fetcher: Arc::new(Fetcher::new(Arc::clone(transport), config.cache_capacity)),
            forges: Arc::new(forges),
        };
    }
}

/// Identifies one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// A finished background load.
#[derive(Debug)]
pub struct Loaded {
    /// Anchor to jump to once the document is displayed.
    pub fragment: Option<String>,
    /// The parsed document or why it could not be produced.
    pub result: Result<Arc<Document>, Error>,
    /// Which request this answers.
    pub ticket: Ticket,
}

/// Runs the pipeline on worker threads and delivers results over a channel.
pub struct Loader {
    /// Newest ticket issued. Results for older tickets are stale.
    latest: Arc<AtomicU64>,
    /// Shared pipeline cloned into each worker.
    pipeline: Pipeline,
    /// Finished loads.
    rx: Receiver<Loaded>,
    /// Handed to workers.
    tx: Sender<Loaded>,
}

impl Loader {
    /// Supersede every in-flight request without issuing a new one.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether `ticket` is still the newest request.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        return self.latest.load(Ordering::SeqCst) == ticket.0;
    }

    /// Create a loader over `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        return Self {
            latest: Arc::new(AtomicU64::new(0)),
            pipeline,
            rx,
            tx,
        };
    }

    /// The pipeline used for synchronous loads.
    pub const fn pipeline(&self) -> &Pipeline {
        return &self.pipeline;
    }

    /// Wait up to `timeout` for the next finished load.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Loaded> {
        return self.rx.recv_timeout(timeout).ok();
    }

    /// Start loading `address` on a worker thread. Any earlier request
    /// still in flight becomes stale.
    pub fn request(&self, address: Address, fragment: Option<String>) -> Ticket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let ticket = Ticket(id);
        let latest = Arc::clone(&self.latest);
        let pipeline = self.pipeline.clone();
        let tx = self.tx.clone();

        std::thread::spawn(move || {
            let result = pipeline.load_address(&address).map(Arc::new);
            if latest.load(Ordering::SeqCst) != id {
                debug!("dropping superseded load of {address}");
                return;
            }
            if tx
                .send(Loaded {
                    fragment,
                    result,
                    ticket,
                })
                .is_err()
            {
                debug!("loader dropped before {address} finished loading");
            }
        });
        return ticket;
    }

    /// The next finished load, if one is waiting.
    pub fn try_recv(&self) -> Option<Loaded> {
        return self.rx.try_recv().ok();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::test_utils::ScriptedTransport;

    fn loader() -> Loader {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::default());
        return Loader::new(Pipeline::new(&transport, &Config::default()));
    }

    #[test]
    fn newer_request_supersedes_older() {
        let loader = loader();
        let first = loader.request(Address::LocalPath(PathBuf::from("/nope/a.md")), None);
        let second = loader.request(Address::LocalPath(PathBuf::from("/nope/b.md")), None);

        assert!(!loader.is_current(first));
        assert!(loader.is_current(second));
    }

    #[test]
    fn result_arrives_on_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "# A\n").unwrap();
        let loader = loader();

        let ticket = loader.request(Address::LocalPath(path), Some("a".to_string()));
        let loaded = loader.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(loaded.ticket, ticket);
        assert_eq!(loaded.fragment.as_deref(), Some("a"));
        assert_eq!(loaded.result.unwrap().anchor_count(), 1);
    }

    #[test]
    fn cancel_makes_pending_stale() {
        let loader = loader();
        let ticket = loader.request(Address::LocalPath(PathBuf::from("/nope/a.md")), None);

        loader.cancel();

        assert!(!loader.is_current(ticket));
    }

    #[test]
    fn anchors_have_no_location() {
        let loader = loader();
        let err = loader.pipeline().locate(&Address::Anchor("x".to_string())).unwrap_err();

        assert!(matches!(err, Error::InvalidAddress { .. }));
    }
}
