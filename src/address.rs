//! Classify free-form input and in-document links into [`Address`] values.
//!
//! Classification is purely lexical: nothing here touches the network or
//! checks that a path exists. Precedence is forge shorthand, then URL, then
//! anchor, then filesystem path.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use crate::error::Error;
use crate::forge::Forge;
use crate::types::{Address, ForgeShorthand, Link, ResolvedLocation};

/// `owner/repo[/path][@branch]`
#[allow(clippy::expect_used, reason = "regex is a compile-time literal")]
static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(?P<owner>[^/\s@:]+)/(?P<repo>[^/\s@:]+)(?:/(?P<path>[^\s@]+))?(?:@(?P<branch>\S+))?$")
        .expect("valid shorthand regex");
});

/// `owner repo [path]` and `owner/repo:branch [path]`
#[allow(clippy::expect_used, reason = "regex is a compile-time literal")]
static SHORTHAND_SPACED: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^(?P<owner>[^/\s@:]+)(?:/|\s+)(?P<repo>[^/\s@:]+)(?::(?P<branch>\S+))?(?:\s+(?P<path>\S+))?$")
        .expect("valid spaced shorthand regex");
});

/// Schemes that never name a document.
const OPAQUE_SCHEMES: &[&str] = &["data", "javascript", "mailto", "tel"];

/// Hint attached to malformed shorthand errors.
const SHORTHAND_USAGE: &str = "expected `<forge> <owner>/<repo>[/<path>][@<branch>]`";

/// Classify user input.
///
/// Relative paths resolve against the directory of `current` when it is a
/// local document, else against the working directory. `~` expands to the
/// home directory.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` for empty input, malformed shorthand,
/// unsupported URL schemes, or an anchor with no current document, and
/// `Error::Io` if the working directory cannot be read.
pub fn resolve(input: &str, current: Option<&ResolvedLocation>) -> Result<Address, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(input, "empty address"));
    }

    if let Some(shorthand) = parse_shorthand(trimmed)? {
        return Ok(Address::Forge(shorthand));
    }
    if let Some(address) = parse_url(trimmed)? {
        return Ok(address);
    }
    if let Some(anchor) = trimmed.strip_prefix('#') {
        if current.is_none() {
            return Err(Error::invalid(input, "anchor with no current document"));
        }
        if anchor.is_empty() {
            return Err(Error::invalid(input, "empty anchor"));
        }
        return Ok(Address::Anchor(anchor.to_string()));
    }

    let base = match current.and_then(ResolvedLocation::as_path) {
        Some(path) => path.parent().map_or_else(|| PathBuf::from("/"), Path::to_path_buf),
        None => std::env::current_dir()?,
    };
    let expanded = shellexpand::tilde(trimmed);
    return Ok(Address::LocalPath(absolutize(Path::new(expanded.as_ref()), &base)));
}

/// Classify a link target found inside the document at `current`.
///
/// Differs from [`resolve`] in two ways: a `#fragment` is split off and
/// returned for a post-visit jump, and relative targets inside a remote
/// document join against its URL rather than the working directory.
///
/// # Errors
///
/// Same as [`resolve`].
pub fn resolve_link(href: &str, current: &ResolvedLocation) -> Result<Link, Error> {
    let trimmed = href.trim();
    if trimmed.starts_with('#') {
        return Ok(Link {
            address: resolve(trimmed, Some(current))?,
            fragment: None,
        });
    }

    if let ResolvedLocation::Remote(base) = current
        && scheme_of(trimmed).is_none()
        && !trimmed.is_empty()
    {
        let mut joined = base.join(trimmed).map_err(|e| return Error::invalid(href, e.to_string()))?;
        let fragment = joined.fragment().filter(|f| return !f.is_empty()).map(String::from);
        joined.set_fragment(None);
        return Ok(Link {
            address: Address::RemoteUrl(joined),
            fragment,
        });
    }

    let (target, fragment) = split_fragment(trimmed);
    let target = if scheme_of(target).is_none() {
        decode(target)
    } else {
        Cow::Borrowed(target)
    };
    let address = match resolve(&target, Some(current))? {
        Address::RemoteUrl(mut url) => {
            url.set_fragment(None);
            Address::RemoteUrl(url)
        },
        other => other,
    };
    return Ok(Link {
        address,
        fragment: fragment.map(String::from),
    });
}

/// Split `target#fragment`. An empty fragment counts as none.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    return match href.split_once('#') {
        Some((target, fragment)) if !fragment.is_empty() => (target, Some(fragment)),
        Some((target, _)) => (target, None),
        None => (href, None),
    };
}

/// Split typed input into what to open and an anchor to scroll to.
///
/// A bare `#anchor` stays whole so it still resolves against the current
/// document.
pub fn split_input(input: &str) -> (&str, Option<&str>) {
    return match split_fragment(input) {
        ("", _) => (input, None),
        split => split,
    };
}

/// Percent-decode a local link target, keeping it as-is if not UTF-8.
fn decode(raw: &str) -> Cow<'_, str> {
    return percent_decode_str(raw).decode_utf8().unwrap_or(Cow::Borrowed(raw));
}

/// Scheme of a URL-looking string, e.g. `https` or `mailto`.
fn scheme_of(input: &str) -> Option<&str> {
    let (scheme, _) = input.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    // A single letter is a Windows drive, not a scheme.
    if !first.is_ascii_alphabetic() || scheme.len() < 2 {
        return None;
    }
    if chars.all(|c| return c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return Some(scheme);
    }
    return None;
}

/// Recognise `scheme://` input. `Ok(None)` when the input has no scheme.
fn parse_url(input: &str) -> Result<Option<Address>, Error> {
    let Some(scheme) = scheme_of(input) else {
        return Ok(None);
    };
    let scheme = scheme.to_ascii_lowercase();
    if OPAQUE_SCHEMES.contains(&scheme.as_str()) {
        return Err(Error::invalid(input, format!("`{scheme}:` links cannot be opened")));
    }
    if !input.get(scheme.len()..).is_some_and(|rest| return rest.starts_with("://")) {
        return Ok(None);
    }

    let url = Url::parse(input).map_err(|e| return Error::invalid(input, e.to_string()))?;
    return match scheme.as_str() {
        "http" | "https" => Ok(Some(Address::RemoteUrl(url))),
        "file" => url
            .to_file_path()
            .map(|path| return Some(Address::LocalPath(normalize_path(&path))))
            .map_err(|()| return Error::invalid(input, "not a local file URL")),
        other => Err(Error::invalid(input, format!("unsupported scheme `{other}`"))),
    };
}

/// Recognise forge shorthand: a known prefix token, whitespace, then the
/// repository reference. `Ok(None)` when the first token is not a forge prefix.
fn parse_shorthand(input: &str) -> Result<Option<ForgeShorthand>, Error> {
    let Some((prefix, rest)) = input.split_once(char::is_whitespace) else {
        return Ok(None);
    };
    let Some(forge) = Forge::from_prefix(prefix) else {
        return Ok(None);
    };
    let rest = rest.trim();

    let captures = SHORTHAND
        .captures(rest)
        .or_else(|| return SHORTHAND_SPACED.captures(rest))
        .ok_or_else(|| return Error::invalid(input, SHORTHAND_USAGE))?;
    let group = |name: &str| return captures.name(name).map(|m| return m.as_str().to_string());

    let (Some(owner), Some(repo)) = (group("owner"), group("repo")) else {
        return Err(Error::invalid(input, SHORTHAND_USAGE));
    };
    return Ok(Some(ForgeShorthand {
        branch: group("branch").filter(|b| return !b.is_empty()),
        forge,
        owner,
        path: group("path").map(|p| return p.trim_matches('/').to_string()).filter(|p| return !p.is_empty()),
        repo,
    }));
}

/// Join `path` onto `base` unless already absolute, then normalise.
fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    return normalize_path(&base.join(path));
}

/// Normalize a path by resolving `.` and `..` components lexically.
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Handle a single path component during normalization.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => match components.last() {
            Some(Component::Normal(_)) => {
                components.pop();
            },
            Some(Component::RootDir | Component::Prefix(_)) => {},
            _ => components.push(component),
        },
        other => components.push(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    fn local(path: &str) -> ResolvedLocation {
        return ResolvedLocation::Local(PathBuf::from(path));
    }

    fn remote(url: &str) -> ResolvedLocation {
        return ResolvedLocation::Remote(Url::parse(url).unwrap());
    }

    fn shorthand(input: &str) -> ForgeShorthand {
        match resolve(input, None).unwrap() {
            Address::Forge(s) => return s,
            other => panic!("expected forge shorthand, got {other:?}"),
        }
    }

    #[test]
    fn full_shorthand_is_parsed() {
        let s = shorthand("gh foo/bar/docs/guide.md@main");

        assert_eq!(s.forge, Forge::GitHub);
        assert_eq!(s.owner, "foo");
        assert_eq!(s.repo, "bar");
        assert_eq!(s.path.as_deref(), Some("docs/guide.md"));
        assert_eq!(s.branch.as_deref(), Some("main"));
    }

    #[test]
    fn minimal_shorthand_leaves_path_and_branch_open() {
        let s = shorthand("gitlab foo/bar");

        assert_eq!(s.forge, Forge::GitLab);
        assert_eq!(s.path, None);
        assert_eq!(s.branch, None);
    }

    #[test]
    fn spaced_shorthand_forms_are_accepted() {
        let spaced = shorthand("bb foo bar docs/a.md");
        assert_eq!((spaced.owner.as_str(), spaced.repo.as_str()), ("foo", "bar"));
        assert_eq!(spaced.path.as_deref(), Some("docs/a.md"));

        let branched = shorthand("cb foo/bar:dev CHANGES.md");
        assert_eq!(branched.branch.as_deref(), Some("dev"));
        assert_eq!(branched.path.as_deref(), Some("CHANGES.md"));
    }

    #[test]
    fn malformed_shorthand_is_invalid() {
        let err = resolve("gh justone", None).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }

    #[test]
    fn http_urls_are_remote() {
        let address = resolve("https://example.com/README.md", None).unwrap();
        assert_eq!(address, Address::RemoteUrl(Url::parse("https://example.com/README.md").unwrap()));
    }

    #[test]
    fn file_urls_are_local() {
        let address = resolve("file:///tmp/a/../b.md", None).unwrap();
        assert_eq!(address, Address::LocalPath(PathBuf::from("/tmp/b.md")));
    }

    #[test]
    fn unknown_schemes_are_invalid() {
        assert!(matches!(resolve("ftp://host/x.md", None), Err(Error::InvalidAddress { .. })));
        assert!(matches!(resolve("mailto:a@b.c", None), Err(Error::InvalidAddress { .. })));
    }

    #[test]
    fn relative_paths_join_the_current_directory() {
        let address = resolve("../b.md", Some(&local("/docs/a/index.md"))).unwrap();
        assert_eq!(address, Address::LocalPath(PathBuf::from("/docs/b.md")));
    }

    #[test]
    fn absolute_paths_are_normalised() {
        let address = resolve("/docs/./x/../y.md", None).unwrap();
        assert_eq!(address, Address::LocalPath(PathBuf::from("/docs/y.md")));
    }

    #[test]
    fn relative_input_with_remote_current_uses_working_directory() {
        let cwd = std::env::current_dir().unwrap();
        let address = resolve("notes.md", Some(&remote("https://example.com/a/README.md"))).unwrap();
        assert_eq!(address, Address::LocalPath(normalize_path(&cwd.join("notes.md"))));
    }

    #[test]
    fn anchors_need_a_current_document() {
        assert!(matches!(resolve("#intro", None), Err(Error::InvalidAddress { .. })));
        assert_eq!(
            resolve("#intro", Some(&local("/a.md"))).unwrap(),
            Address::Anchor("intro".to_string())
        );
    }

    #[test]
    fn empty_input_is_invalid() {
        assert!(matches!(resolve("   ", None), Err(Error::InvalidAddress { .. })));
    }

    #[test]
    fn parent_of_root_stays_at_root() {
        assert_eq!(normalize_path(Path::new("/../a.md")), PathBuf::from("/a.md"));
        assert_eq!(normalize_path(Path::new("../a.md")), PathBuf::from("../a.md"));
    }

    #[test]
    fn local_links_split_fragment_and_decode() {
        let link = resolve_link("other%20file.md#setup", &local("/docs/index.md")).unwrap();

        assert_eq!(link.address, Address::LocalPath(PathBuf::from("/docs/other file.md")));
        assert_eq!(link.fragment.as_deref(), Some("setup"));
    }

    #[test]
    fn remote_links_join_the_document_url() {
        let link = resolve_link("../guide.md#install", &remote("https://example.com/repo/docs/README.md")).unwrap();

        assert_eq!(
            link.address,
            Address::RemoteUrl(Url::parse("https://example.com/repo/guide.md").unwrap())
        );
        assert_eq!(link.fragment.as_deref(), Some("install"));
    }

    #[test]
    fn absolute_url_links_are_taken_as_is() {
        let link = resolve_link("https://other.org/x.md#y", &local("/docs/index.md")).unwrap();

        assert_eq!(link.address, Address::RemoteUrl(Url::parse("https://other.org/x.md").unwrap()));
        assert_eq!(link.fragment.as_deref(), Some("y"));
    }

    #[test]
    fn bare_anchor_links_stay_in_document() {
        let link = resolve_link("#faq", &local("/docs/index.md")).unwrap();

        assert_eq!(link.address, Address::Anchor("faq".to_string()));
        assert_eq!(link.fragment, None);
    }

    #[test]
    fn typed_fragments_are_split_unless_bare() {
        assert_eq!(split_input("docs/guide.md#install"), ("docs/guide.md", Some("install")));
        assert_eq!(split_input("https://x.org/a.md#usage"), ("https://x.org/a.md", Some("usage")));
        assert_eq!(split_input("guide.md#"), ("guide.md", None));
        assert_eq!(split_input("#install"), ("#install", None));
    }

    #[test]
    fn mailto_links_are_invalid() {
        let err = resolve_link("mailto:team@example.com", &local("/docs/index.md")).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }
}
