//! Shared test helpers: an in-memory transport with scripted responses.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use url::Url;

use crate::error::Error;
use crate::fetch::{Response, Transport};

/// Transport answering from a fixed table. Unknown URLs answer 404.
/// Every request is recorded as `"HEAD <url>"` or `"GET <url>"`.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Requests in arrival order.
    log: Mutex<Vec<String>>,
    /// Canned responses by URL.
    routes: HashMap<String, Response>,
    /// URLs that fail at transport level.
    unreachable: HashSet<String>,
}

impl ScriptedTransport {
    /// Answer `url` with `status` and a markdown body.
    pub fn with(self, url: &str, status: u16, body: &str) -> Self {
        return self.with_content_type(url, status, "text/markdown", body);
    }

    /// Answer `url` with an explicit content type.
    pub fn with_content_type(mut self, url: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Response {
                body: body.as_bytes().to_vec(),
                content_type: Some(content_type.to_string()),
                status,
            },
        );
        return self;
    }

    /// Fail every request to `url` as if the host were down.
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        return self;
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<String> {
        return self.log.lock().clone();
    }

    /// Number of GET requests made for `url`.
    pub fn gets(&self, url: &str) -> usize {
        let wanted = format!("GET {url}");
        return self.log.lock().iter().filter(|r| return **r == wanted).count();
    }

    /// Record the request and look up its scripted response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` for URLs marked unreachable.
    fn answer(&self, method: &str, url: &Url) -> Result<Response, Error> {
        self.log.lock().push(format!("{method} {url}"));
        if self.unreachable.contains(url.as_str()) {
            return Err(Error::Transport {
                reason: "connection refused".to_string(),
                url: url.to_string(),
            });
        }
        return Ok(self.routes.get(url.as_str()).cloned().unwrap_or(Response {
            body: Vec::new(),
            content_type: None,
            status: 404,
        }));
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &Url) -> Result<Response, Error> {
        return self.answer("GET", url);
    }

    fn head(&self, url: &Url) -> Result<u16, Error> {
        return self.answer("HEAD", url).map(|r| return r.status);
    }
}
