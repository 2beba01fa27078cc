//! One-shot CLI commands: view, toc, resolve, expand, local, bookmarks, history.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::address;
use crate::bookmarks::BookmarkStore;
use crate::config::Config;
use crate::document::HeadingNode;
use crate::error::Error;
use crate::fetch::{HttpTransport, Transport};
use crate::forge::ForgeResolver;
use crate::local;
use crate::session::{Navigation, Session};
use crate::store;
use crate::types::{Address, ResolvedLocation};

// ── Documents ─────────────────────────────────────────────────────────

/// Resolve `input` against `from` (or the working directory) and print how
/// it was classified. Nothing is fetched.
///
/// With `from`, input is treated as a link inside that document, so a
/// trailing `#fragment` is split off and reported separately.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` when either input cannot be classified.
pub fn resolve(input: &str, from: Option<&str>) -> Result<(), Error> {
    let (resolved, fragment) = match from {
        Some(from) => {
            let base = location_of(from)?;
            let link = address::resolve_link(input, &base)?;
            (link.address, link.fragment)
        },
        None => (address::resolve(input, None)?, None),
    };

    let kind = match &resolved {
        Address::Anchor(_) => "anchor",
        Address::Forge(_) => "forge",
        Address::LocalPath(_) => "local",
        Address::RemoteUrl(_) => "remote",
    };
    println!("{kind:<8}{resolved}");
    if let Some(fragment) = fragment {
        println!("{:<8}#{fragment}", "anchor");
    }
    return Ok(());
}

/// Expand forge shorthand to the raw URL it is served from, probing branches
/// when none is named.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` if `input` is not forge shorthand, or
/// `Error::BranchNotFound` and transport errors from probing.
pub fn expand(config: &Config, input: &str) -> Result<(), Error> {
    let Address::Forge(shorthand) = address::resolve(input, None)? else {
        return Err(Error::invalid(input, "not forge shorthand"));
    };
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.timeout(), &config.user_agent)?);
    let resolver = ForgeResolver::new(transport, config.branch_candidates.clone(), config.query_forge_api);
    println!("{}", resolver.expand(&shorthand)?);
    return Ok(());
}

/// List markdown files under `dir`, relative to it.
///
/// # Errors
///
/// Returns `Error::NotFound` or `Error::NotAFile` for a bad directory.
pub fn local(config: &Config, dir: &Path) -> Result<(), Error> {
    let files = local::markdown_files(dir, config)?;
    if files.is_empty() {
        eprintln!("No markdown files under {}", dir.display());
        return Ok(());
    }
    for file in &files {
        let shown = file.strip_prefix(dir).unwrap_or(file);
        println!("{}", shown.display());
    }
    return Ok(());
}

/// Print a document's heading tree with anchor ids.
///
/// # Errors
///
/// Returns resolution, fetch, or parse errors.
pub fn toc(config: &Config, input: &str) -> Result<(), Error> {
    let mut session = Session::open(config)?;
    let Navigation::Visited(document) = session.navigate(input)? else {
        return Ok(());
    };
    if document.toc().is_empty() {
        eprintln!("{} has no headings", document.location());
        return Ok(());
    }
    print!("{}", render_toc(document.toc()));
    return Ok(());
}

/// Fetch a document and print its body, optionally preceded by its
/// table of contents. The visit is recorded in history.
///
/// A `#fragment` on a path or URL scrolls to that heading, and printing
/// starts there.
///
/// # Errors
///
/// Returns resolution, fetch, parse, or anchor errors.
pub fn view(config: &Config, input: &str, with_toc: bool) -> Result<(), Error> {
    let (target, fragment) = address::split_input(input);
    let mut session = Session::open(config)?;
    let Navigation::Visited(document) = session.navigate(target)? else {
        return Ok(());
    };
    let start = match fragment {
        Some(anchor) => session.jump(anchor)?,
        None => 0,
    };
    if with_toc && !document.toc().is_empty() {
        print!("{}", render_toc(document.toc()));
        println!();
    }
    for line in document.body().lines().skip(start) {
        println!("{line}");
    }
    return Ok(());
}

// ── Bookmarks ─────────────────────────────────────────────────────────

/// Bookmark an address without fetching it.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` or persistence errors.
pub fn bookmark_add(config: &Config, input: &str, title: Option<&str>) -> Result<(), Error> {
    let target = bookmark_address(input)?;
    let title = title.map_or_else(|| return default_title(&target), String::from);
    let mut bookmarks = BookmarkStore::load(store::open(config))?;
    if bookmarks.add(&title, target.clone())? {
        eprintln!("Bookmarked {target} as \"{title}\"");
    } else {
        eprintln!("{target} is already bookmarked");
    }
    return Ok(());
}

/// Print saved bookmarks in order.
///
/// # Errors
///
/// Returns persistence errors.
pub fn bookmark_list(config: &Config) -> Result<(), Error> {
    let bookmarks = BookmarkStore::load(store::open(config))?;
    if bookmarks.is_empty() {
        eprintln!("No bookmarks");
        return Ok(());
    }
    for (i, bookmark) in bookmarks.list().enumerate() {
        println!("{i:>3}  {}  {}", bookmark.title, bookmark.address);
    }
    return Ok(());
}

/// Move a bookmark to a new position.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` or persistence errors.
pub fn bookmark_move(config: &Config, input: &str, index: usize) -> Result<(), Error> {
    let target = bookmark_address(input)?;
    let mut bookmarks = BookmarkStore::load(store::open(config))?;
    if !bookmarks.move_to(&target, index)? {
        eprintln!("{target} is not bookmarked");
    }
    return Ok(());
}

/// Delete the bookmark for an address.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` or persistence errors.
pub fn bookmark_remove(config: &Config, input: &str) -> Result<(), Error> {
    let target = bookmark_address(input)?;
    let mut bookmarks = BookmarkStore::load(store::open(config))?;
    if bookmarks.remove(&target)? {
        eprintln!("Removed bookmark for {target}");
    } else {
        eprintln!("{target} is not bookmarked");
    }
    return Ok(());
}

/// Retitle the bookmark for an address.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` or persistence errors.
pub fn bookmark_rename(config: &Config, input: &str, title: &str) -> Result<(), Error> {
    let target = bookmark_address(input)?;
    let mut bookmarks = BookmarkStore::load(store::open(config))?;
    if !bookmarks.rename(&target, title)? {
        eprintln!("{target} is not bookmarked");
    }
    return Ok(());
}

/// Classify bookmark input. Anchors only mean something inside a document.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` for unclassifiable input or an anchor.
fn bookmark_address(input: &str) -> Result<Address, Error> {
    let target = address::resolve(input, None)?;
    if matches!(target, Address::Anchor(_)) {
        return Err(Error::invalid(input, "an anchor cannot be bookmarked on its own"));
    }
    return Ok(target);
}

/// Title used when none is given: the file the address names.
fn default_title(target: &Address) -> String {
    return match target {
        Address::Anchor(id) => id.clone(),
        Address::Forge(shorthand) => shorthand
            .path
            .as_deref()
            .and_then(|p| return p.rsplit('/').next())
            .map_or_else(|| return format!("{}/{}", shorthand.owner, shorthand.repo), String::from),
        Address::LocalPath(path) => ResolvedLocation::Local(path.clone()).file_name(),
        Address::RemoteUrl(url) => ResolvedLocation::Remote(url.clone()).file_name(),
    };
}

// ── History ───────────────────────────────────────────────────────────

/// Forget all saved history.
///
/// # Errors
///
/// Returns persistence errors.
pub fn history_clear(config: &Config) -> Result<(), Error> {
    store::open(config).save_history(&[])?;
    eprintln!("History cleared");
    return Ok(());
}

/// Print saved history, oldest first.
///
/// # Errors
///
/// Returns persistence errors.
pub fn history_list(config: &Config) -> Result<(), Error> {
    let history = store::open(config).load_history()?;
    if history.is_empty() {
        eprintln!("No history");
        return Ok(());
    }
    for (i, location) in history.iter().enumerate() {
        println!("{i:>3}  {location}");
    }
    return Ok(());
}

/// Delete one saved history entry by index.
///
/// # Errors
///
/// Returns `Error::HistoryIndex` for an out-of-range index, or persistence errors.
pub fn history_remove(config: &Config, index: usize) -> Result<(), Error> {
    let persistence = store::open(config);
    let mut history = persistence.load_history()?;
    if index >= history.len() {
        return Err(Error::HistoryIndex { index, len: history.len() });
    }
    let removed = history.remove(index);
    persistence.save_history(&history)?;
    eprintln!("Removed {removed}");
    return Ok(());
}

// ── Shared ────────────────────────────────────────────────────────────

/// A concrete location for `--from`: a path or URL, never shorthand.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` for anything else.
fn location_of(input: &str) -> Result<ResolvedLocation, Error> {
    return match address::resolve(input, None)? {
        Address::LocalPath(path) => Ok(ResolvedLocation::Local(path)),
        Address::RemoteUrl(url) => Ok(ResolvedLocation::Remote(url)),
        Address::Anchor(_) | Address::Forge(_) => Err(Error::invalid(input, "expected a file path or URL")),
    };
}

/// Indented outline of a heading tree, one heading per line.
pub fn render_toc(nodes: &[HeadingNode]) -> String {
    let mut out = String::new();
    render_toc_level(nodes, 0, &mut out);
    return out;
}

/// Append `nodes` at `depth` and recurse into their children.
fn render_toc_level(nodes: &[HeadingNode], depth: usize, out: &mut String) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}- {} (#{})", node.text, node.anchor_id);
        render_toc_level(&node.children, depth.saturating_add(1), out);
    }
}
