/// Core addressing types shared by the resolver, fetcher, and navigation state.
use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::forge::Forge;

/// A classified navigation request. Produced per request by the address
/// resolver and never mutated afterwards: resolving again yields a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Jump to an anchor inside the currently displayed document.
    Anchor(String),
    /// A file inside a forge-hosted repository.
    Forge(ForgeShorthand),
    /// Absolute, normalised filesystem path.
    LocalPath(PathBuf),
    /// Fully-qualified HTTP(S) URL.
    RemoteUrl(Url),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Self::Anchor(id) => write!(f, "#{id}"),
            Self::Forge(shorthand) => write!(f, "{shorthand}"),
            Self::LocalPath(path) => write!(f, "{}", path.display()),
            Self::RemoteUrl(url) => write!(f, "{url}"),
        };
    }
}

/// Compact reference to a file in a forge-hosted repository, e.g.
/// `gh owner/repo/docs/guide.md@main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForgeShorthand {
    /// Branch to read from; inferred by probing when absent.
    pub branch: Option<String>,
    /// Which forge hosts the repository.
    pub forge: Forge,
    /// Repository owner (user or organisation).
    pub owner: String,
    /// File within the repository; `README.md` when absent.
    pub path: Option<String>,
    /// Repository name.
    pub repo: String,
}

impl fmt::Display for ForgeShorthand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.forge.prefix(), self.owner, self.repo)?;
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        if let Some(branch) = &self.branch {
            write!(f, "@{branch}")?;
        }
        return Ok(());
    }
}

/// The concrete, fetchable form of an address. Used as the fetch key and as
/// the base for relative-link resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedLocation {
    /// Absolute filesystem path.
    Local(PathBuf),
    /// Fully-qualified HTTP(S) URL.
    Remote(Url),
}

impl ResolvedLocation {
    /// Parse a persisted location string. HTTP(S) URLs become remote
    /// locations, anything else is taken as a filesystem path.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        if (lowered.starts_with("http://") || lowered.starts_with("https://"))
            && let Ok(url) = Url::parse(raw)
        {
            return Self::Remote(url);
        }
        return Self::Local(PathBuf::from(raw));
    }

    /// The final path segment, used as a default bookmark title.
    pub fn file_name(&self) -> String {
        let name = match self {
            Self::Local(path) => path.file_name().map(|n| return n.to_string_lossy().into_owned()),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| return segments.next_back().map(String::from))
                .filter(|s| return !s.is_empty()),
        };
        return name.unwrap_or_else(|| return self.to_string());
    }

    /// The filesystem path, when this location is local.
    pub fn as_path(&self) -> Option<&Path> {
        return match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        };
    }

    /// Convert back into an address, e.g. for bookmarking what is displayed.
    pub fn to_address(&self) -> Address {
        return match self {
            Self::Local(path) => Address::LocalPath(path.clone()),
            Self::Remote(url) => Address::RemoteUrl(url.clone()),
        };
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        };
    }
}

/// A link found in a document, split into where to go and which anchor to
/// jump to once the target is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Where the link points.
    pub address: Address,
    /// Anchor to jump to after the visit, without the leading `#`.
    pub fragment: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn parse_recognises_urls() {
        let location = ResolvedLocation::parse("https://example.com/a/README.md");
        assert!(matches!(location, ResolvedLocation::Remote(_)));
        assert_eq!(location.file_name(), "README.md");
    }

    #[test]
    fn parse_falls_back_to_path() {
        let location = ResolvedLocation::parse("/docs/guide.md");
        assert_eq!(location, ResolvedLocation::Local(PathBuf::from("/docs/guide.md")));
        assert_eq!(location.file_name(), "guide.md");
    }

    #[test]
    fn remote_without_file_name_uses_whole_url() {
        let location = ResolvedLocation::parse("https://example.com/");
        assert_eq!(location.file_name(), "https://example.com/");
    }

    #[test]
    fn forge_shorthand_display_round_trips_grammar() {
        let shorthand = ForgeShorthand {
            branch: Some("dev".to_string()),
            forge: Forge::GitHub,
            owner: "foo".to_string(),
            path: Some("docs/a.md".to_string()),
            repo: "bar".to_string(),
        };
        assert_eq!(shorthand.to_string(), "gh foo/bar/docs/a.md@dev");
    }
}
