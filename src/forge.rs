//! Forge shorthand expansion: raw-content URL templates and default-branch inference.
//!
//! Every forge is a row in a data table. Expansion is template substitution
//! plus an ordered branch-candidate probe; no forge has behaviour of its own.

use std::sync::Arc;

use log::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::fetch::Transport;
use crate::types::{ForgeShorthand, ResolvedLocation};

/// File assumed when a shorthand names no path.
pub const DEFAULT_FILE: &str = "README.md";

/// A hosted Git platform exposing raw-file HTTP access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Forge {
    /// bitbucket.org
    BitBucket,
    /// codeberg.org
    Codeberg,
    /// github.com
    GitHub,
    /// gitlab.com
    GitLab,
}

/// One row of the forge table.
struct ForgeRow {
    /// Template for the repository metadata API, if the forge has one.
    api: Option<&'static str>,
    /// JSON pointer to the default branch name in the API response.
    default_branch_pointer: &'static str,
    /// Human-readable forge name.
    name: &'static str,
    /// Prefix tokens accepted in shorthand; the first is canonical.
    prefixes: &'static [&'static str],
    /// Template for raw file content.
    raw: &'static str,
}

const BITBUCKET: ForgeRow = ForgeRow {
    api: Some("https://api.bitbucket.org/2.0/repositories/{owner}/{repo}"),
    default_branch_pointer: "/mainbranch/name",
    name: "Bitbucket",
    prefixes: &["bb", "bitbucket"],
    raw: "https://bitbucket.org/{owner}/{repo}/raw/{branch}/{path}",
};

const CODEBERG: ForgeRow = ForgeRow {
    api: Some("https://codeberg.org/api/v1/repos/{owner}/{repo}"),
    default_branch_pointer: "/default_branch",
    name: "Codeberg",
    prefixes: &["cb", "codeberg"],
    raw: "https://codeberg.org/{owner}/{repo}/raw/branch/{branch}/{path}",
};

const GITHUB: ForgeRow = ForgeRow {
    api: Some("https://api.github.com/repos/{owner}/{repo}"),
    default_branch_pointer: "/default_branch",
    name: "GitHub",
    prefixes: &["gh", "github"],
    raw: "https://raw.githubusercontent.com/{owner}/{repo}/{branch}/{path}",
};

const GITLAB: ForgeRow = ForgeRow {
    api: Some("https://gitlab.com/api/v4/projects/{owner}%2F{repo}"),
    default_branch_pointer: "/default_branch",
    name: "GitLab",
    prefixes: &["gl", "gitlab"],
    raw: "https://gitlab.com/{owner}/{repo}/-/raw/{branch}/{path}",
};

impl Forge {
    /// All recognised forges, in table order.
    pub const ALL: [Self; 4] = [Self::GitHub, Self::GitLab, Self::BitBucket, Self::Codeberg];

    /// Look up a forge by one of its shorthand prefix tokens (case-insensitive).
    pub fn from_prefix(token: &str) -> Option<Self> {
        return Self::ALL.into_iter().find(|forge| {
            return forge.row().prefixes.iter().any(|p| return p.eq_ignore_ascii_case(token));
        });
    }

    /// Human-readable forge name.
    pub const fn name(self) -> &'static str {
        return self.row().name;
    }

    /// Canonical shorthand prefix.
    pub fn prefix(self) -> &'static str {
        return self.row().prefixes.first().copied().unwrap_or_default();
    }

    /// All accepted shorthand prefixes.
    pub const fn prefixes(self) -> &'static [&'static str] {
        return self.row().prefixes;
    }

    /// The table row for this forge.
    const fn row(self) -> &'static ForgeRow {
        return match self {
            Self::BitBucket => &BITBUCKET,
            Self::Codeberg => &CODEBERG,
            Self::GitHub => &GITHUB,
            Self::GitLab => &GITLAB,
        };
    }
}

/// Substitute repository coordinates into a forge URL template.
fn fill_template(template: &str, owner: &str, repo: &str, branch: &str, path: &str) -> String {
    return template
        .replace("{owner}", owner)
        .replace("{repo}", repo)
        .replace("{branch}", branch)
        .replace("{path}", path);
}

/// Build the raw-content URL for a shorthand on a specific branch.
/// Pure: performs no I/O.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` if the substituted template is not a valid URL.
pub fn raw_url(shorthand: &ForgeShorthand, branch: &str) -> Result<Url, Error> {
    let path = shorthand
        .path
        .as_deref()
        .map(|p| return p.trim_start_matches('/'))
        .filter(|p| return !p.is_empty())
        .unwrap_or(DEFAULT_FILE);
    let raw = fill_template(shorthand.forge.row().raw, &shorthand.owner, &shorthand.repo, branch, path);
    return Url::parse(&raw).map_err(|e| return Error::invalid(&shorthand.to_string(), e.to_string()));
}

/// Expands forge shorthand into fetchable raw-content URLs.
pub struct ForgeResolver {
    /// Branch names probed, in priority order, when none is given.
    candidates: Vec<String>,
    /// Whether to ask the forge API for the repository's default branch.
    query_api: bool,
    /// Injected HTTP transport used for probes and API lookups.
    transport: Arc<dyn Transport>,
}

impl ForgeResolver {
    /// Create a resolver probing `candidates` in order.
    pub fn new(transport: Arc<dyn Transport>, candidates: Vec<String>, query_api: bool) -> Self {
        return Self {
            candidates,
            query_api,
            transport,
        };
    }

    /// Turn shorthand into a concrete location.
    ///
    /// With an explicit branch the URL is built directly and nothing is probed;
    /// a missing file then surfaces later, at fetch time. Otherwise each
    /// candidate branch is probed with a HEAD request and the first that
    /// answers 2xx wins. The forge-reported default branch is tried last.
    ///
    /// # Errors
    ///
    /// Returns `Error::BranchNotFound` when every candidate fails,
    /// `Error::Transport` when a probe cannot be made at all,
    /// or `Error::InvalidAddress` if a URL cannot be built.
    pub fn expand(&self, shorthand: &ForgeShorthand) -> Result<ResolvedLocation, Error> {
        if let Some(branch) = &shorthand.branch {
            return Ok(ResolvedLocation::Remote(raw_url(shorthand, branch)?));
        }

        let mut tried: Vec<String> = Vec::new();
        for candidate in &self.candidates {
            if tried.contains(candidate) {
                continue;
            }
            tried.push(candidate.clone());
            if let Some(url) = self.probe(shorthand, candidate)? {
                return Ok(ResolvedLocation::Remote(url));
            }
        }

        if self.query_api
            && let Some(reported) = self.reported_default_branch(shorthand)
            && !tried.contains(&reported)
        {
            tried.push(reported.clone());
            if let Some(url) = self.probe(shorthand, &reported)? {
                return Ok(ResolvedLocation::Remote(url));
            }
        }

        return Err(Error::BranchNotFound {
            forge: shorthand.forge.name(),
            owner: shorthand.owner.clone(),
            path: shorthand.path.clone().unwrap_or_else(|| return DEFAULT_FILE.to_string()),
            repo: shorthand.repo.clone(),
            tried,
        });
    }

    /// HEAD the raw URL for one branch. `Some(url)` if it exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the request cannot be made.
    fn probe(&self, shorthand: &ForgeShorthand, branch: &str) -> Result<Option<Url>, Error> {
        let url = raw_url(shorthand, branch)?;
        let status = self.transport.head(&url)?;
        debug!("probe {url} -> {status}");
        if (200..300).contains(&status) {
            return Ok(Some(url));
        }
        return Ok(None);
    }

    /// Ask the forge API which branch is the default. Failures are logged
    /// and yield `None`: the API is a hint, not a requirement.
    fn reported_default_branch(&self, shorthand: &ForgeShorthand) -> Option<String> {
        let row = shorthand.forge.row();
        let template = row.api?;
        let api = fill_template(template, &shorthand.owner, &shorthand.repo, "", "");
        let url = Url::parse(&api).ok()?;

        let response = match self.transport.get(&url) {
            Ok(r) => r,
            Err(e) => {
                warn!("default branch lookup failed: {e}");
                return None;
            },
        };
        if !(200..300).contains(&response.status) {
            debug!("default branch lookup {url} -> {}", response.status);
            return None;
        }

        let value: serde_json::Value = match serde_json::from_slice(&response.body) {
            Ok(v) => v,
            Err(e) => {
                warn!("default branch lookup returned bad JSON: {e}");
                return None;
            },
        };
        return value
            .pointer(row.default_branch_pointer)
            .and_then(serde_json::Value::as_str)
            .filter(|b| return !b.is_empty())
            .map(String::from);
    }
}
