/// Crate-level error types for mdnav diagnostics.
use std::path::PathBuf;

use crate::types::ResolvedLocation;

/// All errors in mdnav carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the input, location, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-level error type shared by library and binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The jump target is absent from the current document's anchor index.
    #[error("anchor not found: `#{anchor}` in {location}")]
    AnchorNotFound {
        /// Anchor id that was looked up.
        anchor: String,
        /// Document that was searched.
        location: ResolvedLocation,
    },

    /// Every candidate branch was probed and none held the requested file.
    #[error("no branch of {forge} repository {owner}/{repo} has `{path}` (tried: {})", tried.join(", "))]
    BranchNotFound {
        /// Display name of the forge.
        forge: &'static str,
        /// Repository owner.
        owner: String,
        /// File that was looked for.
        path: String,
        /// Repository name.
        repo: String,
        /// Branch names probed, in order.
        tried: Vec<String>,
    },

    /// An explicitly named config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// The navigation stack holds no document.
    #[error("history is empty")]
    EmptyHistory,

    /// A history index outside the stack was named.
    #[error("no history entry at index {index} (history holds {len})")]
    HistoryIndex {
        /// Index that was requested.
        index: usize,
        /// Number of entries in the stack.
        len: usize,
    },

    /// Input matches none of the recognised address shapes.
    #[error("invalid address `{input}`: {reason}")]
    InvalidAddress {
        /// The literal input, surfaced verbatim.
        input: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization of persisted state failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// Back or forward was attempted at a stack boundary.
    #[error("no history in that direction")]
    NoHistory,

    /// The location exists but is not a regular file.
    #[error("not a file: {}", path.display())]
    NotAFile {
        /// Path that is a directory or special file.
        path: PathBuf,
    },

    /// The location does not exist (missing file or a 4xx response).
    #[error("not found: {location}{}", status.map(|s| return format!(" (HTTP {s})")).unwrap_or_default())]
    NotFound {
        /// Location that was fetched.
        location: ResolvedLocation,
        /// HTTP status for remote locations.
        status: Option<u16>,
    },

    /// The markdown parser could not process a document.
    #[error("parse failed: {location}: {reason}")]
    ParseFailed {
        /// Document being parsed.
        location: ResolvedLocation,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// Connection failure, timeout, or a server-side (5xx) response.
    #[error("transport error: {url}: {reason}")]
    Transport {
        /// Description of the failure.
        reason: String,
        /// URL that was requested.
        url: String,
    },
}

impl Error {
    /// Whether this error is an expected stack boundary rather than a failure.
    /// Callers treat boundary errors as a no-op with a signal.
    pub const fn is_boundary(&self) -> bool {
        return matches!(self, Self::NoHistory | Self::EmptyHistory);
    }

    /// Shorthand for an `InvalidAddress` error.
    pub(crate) fn invalid(input: &str, reason: impl Into<String>) -> Self {
        return Self::InvalidAddress {
            input: input.to_string(),
            reason: reason.into(),
        };
    }
}
