//! Raw byte retrieval for local and remote locations.
//!
//! HTTP goes through the [`Transport`] seam so tests can script responses.
//! Remote bodies are memoised in a small LRU cache; local files are always
//! read fresh so edits show up on the next visit.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use lru::LruCache;
use parking_lot::Mutex;
use url::Url;

use crate::error::Error;
use crate::types::ResolvedLocation;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct Response {
    /// Response body.
    pub body: Vec<u8>,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// HTTP status code.
    pub status: u16,
}

/// Blocking HTTP client abstraction.
pub trait Transport: Send + Sync {
    /// Perform a GET request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` when no response is received.
    fn get(&self, url: &Url) -> Result<Response, Error>;

    /// Perform a HEAD request, following redirects, and return the final status.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` when no response is received.
    fn head(&self, url: &Url) -> Result<u16, Error>;
}

/// [`Transport`] backed by a blocking reqwest client.
pub struct HttpTransport {
    /// Shared connection pool with timeout and user agent applied.
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client with the given per-request timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                return Error::Transport {
                    reason: e.to_string(),
                    url: String::new(),
                };
            })?;
        return Ok(Self { client });
    }
}

/// Map a reqwest failure to `Error::Transport`, naming timeouts plainly.
fn transport_error(url: &Url, err: &reqwest::Error) -> Error {
    let reason = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    };
    return Error::Transport {
        reason,
        url: url.to_string(),
    };
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Response, Error> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| return transport_error(url, &e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| return v.to_str().ok())
            .map(String::from);
        let body = response.bytes().map_err(|e| return transport_error(url, &e))?.to_vec();
        return Ok(Response {
            body,
            content_type,
            status,
        });
    }

    fn head(&self, url: &Url) -> Result<u16, Error> {
        let response = self
            .client
            .head(url.as_str())
            .send()
            .map_err(|e| return transport_error(url, &e))?;
        return Ok(response.status().as_u16());
    }
}

/// Whether a content type is something we can render as markdown.
fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    return mime.starts_with("text/") || mime.contains("markdown");
}

/// Fetches raw bytes for a location, caching remote bodies.
pub struct Fetcher {
    /// Remote bodies by URL, most recent first.
    cache: Mutex<LruCache<Url, Arc<[u8]>>>,
    /// Where remote bytes come from.
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    /// Create a fetcher holding at most `capacity` remote bodies.
    pub fn new(transport: Arc<dyn Transport>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        return Self {
            cache: Mutex::new(LruCache::new(capacity)),
            transport,
        };
    }

    /// Retrieve bytes, serving remote locations from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for a missing file or a 4xx response,
    /// `Error::NotAFile` for directories, `Error::Transport` for connection
    /// failures and 5xx responses, and `Error::Io` for other read failures.
    pub fn fetch(&self, location: &ResolvedLocation) -> Result<Arc<[u8]>, Error> {
        return match location {
            ResolvedLocation::Local(path) => read_local(path, location),
            ResolvedLocation::Remote(url) => {
                if let Some(hit) = self.cache.lock().get(url) {
                    debug!("cache hit {url}");
                    return Ok(Arc::clone(hit));
                }
                self.fetch_remote(url, location)
            },
        };
    }

    /// Retrieve bytes bypassing the cache, then refresh the cached copy.
    ///
    /// # Errors
    ///
    /// Same as [`Fetcher::fetch`].
    pub fn fetch_fresh(&self, location: &ResolvedLocation) -> Result<Arc<[u8]>, Error> {
        return match location {
            ResolvedLocation::Local(path) => read_local(path, location),
            ResolvedLocation::Remote(url) => self.fetch_remote(url, location),
        };
    }

    /// GET `url`, mapping the status and caching a successful body.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for 4xx and `Error::Transport` otherwise.
    fn fetch_remote(&self, url: &Url, location: &ResolvedLocation) -> Result<Arc<[u8]>, Error> {
        let response = self.transport.get(url)?;
        debug!("GET {url} -> {}", response.status);

        match response.status {
            200..=299 => {},
            400..=499 => {
                return Err(Error::NotFound {
                    location: location.clone(),
                    status: Some(response.status),
                });
            },
            status => {
                return Err(Error::Transport {
                    reason: format!("HTTP {status}"),
                    url: url.to_string(),
                });
            },
        }

        if let Some(content_type) = &response.content_type
            && !is_textual(content_type)
        {
            warn!("{url} served as `{content_type}`, rendering anyway");
        }

        let body: Arc<[u8]> = Arc::from(response.body);
        self.cache.lock().put(url.clone(), Arc::clone(&body));
        return Ok(body);
    }
}

/// Read a local file in full.
///
/// # Errors
///
/// Returns `Error::NotFound`, `Error::NotAFile`, or `Error::Io`.
fn read_local(path: &Path, location: &ResolvedLocation) -> Result<Arc<[u8]>, Error> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound {
                location: location.clone(),
                status: None,
            });
        },
        Err(e) => return Err(Error::Io(e)),
    };
    if !meta.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }
    return Ok(Arc::from(std::fs::read(path)?));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTransport;

    const DOC: &str = "https://example.com/docs/README.md";

    fn remote(url: &str) -> ResolvedLocation {
        return ResolvedLocation::Remote(Url::parse(url).unwrap());
    }

    #[test]
    fn local_file_bytes_are_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "# A\n").unwrap();
        let fetcher = Fetcher::new(Arc::new(ScriptedTransport::default()), 4);

        let bytes = fetcher.fetch(&ResolvedLocation::Local(path)).unwrap();
        assert_eq!(&*bytes, b"# A\n");
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Arc::new(ScriptedTransport::default()), 4);

        let err = fetcher
            .fetch(&ResolvedLocation::Local(dir.path().join("nope.md")))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { status: None, .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Arc::new(ScriptedTransport::default()), 4);

        let err = fetcher
            .fetch(&ResolvedLocation::Local(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, Error::NotAFile { .. }));
    }

    #[test]
    fn client_errors_are_not_found_with_status() {
        let fetcher = Fetcher::new(Arc::new(ScriptedTransport::default()), 4);

        let err = fetcher.fetch(&remote(DOC)).unwrap_err();
        assert!(matches!(err, Error::NotFound { status: Some(404), .. }));
    }

    #[test]
    fn server_errors_are_transport_errors() {
        let transport = ScriptedTransport::default().with(DOC, 503, "down");
        let fetcher = Fetcher::new(Arc::new(transport), 4);

        let err = fetcher.fetch(&remote(DOC)).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[test]
    fn remote_bodies_are_cached_until_fetched_fresh() {
        let transport = Arc::new(ScriptedTransport::default().with(DOC, 200, "# Doc"));
        let fetcher = Fetcher::new(Arc::clone(&transport) as Arc<dyn Transport>, 4);

        fetcher.fetch(&remote(DOC)).unwrap();
        fetcher.fetch(&remote(DOC)).unwrap();
        assert_eq!(transport.gets(DOC), 1);

        fetcher.fetch_fresh(&remote(DOC)).unwrap();
        assert_eq!(transport.gets(DOC), 2);
    }

    #[test]
    fn non_text_content_is_still_returned() {
        let transport = ScriptedTransport::default().with_content_type(DOC, 200, "application/octet-stream", "# x");
        let fetcher = Fetcher::new(Arc::new(transport), 4);

        assert_eq!(&*fetcher.fetch(&remote(DOC)).unwrap(), b"# x");
    }

    #[test]
    fn textual_content_types() {
        assert!(is_textual("text/plain; charset=utf-8"));
        assert!(is_textual("text/markdown"));
        assert!(is_textual("application/x-markdown"));
        assert!(!is_textual("image/png"));
    }
}
