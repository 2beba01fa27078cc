use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::forge::Forge;
use crate::store::{JsonStore, Persistence};

/// Output the mdnav reference document.
pub fn run(config: &Config, config_path: Option<&Path>, json: bool) {
    let state = gather_state(config, config_path);

    if json {
        print_json(config, &state);
    } else {
        print_markdown(config, &state);
    }
}

// ── State gathering ───────────────────────────────────────────────────

/// What is on disk right now.
struct CurrentState {
    /// Saved bookmarks, if readable.
    bookmarks: Option<usize>,
    /// Config file in effect, and whether it exists.
    config_path: Option<(PathBuf, bool)>,
    /// Data directory, if one could be determined.
    data_dir: Option<PathBuf>,
    /// Saved history entries, if readable.
    history: Option<usize>,
}

/// Inspect config and stored state without failing.
fn gather_state(config: &Config, explicit: Option<&Path>) -> CurrentState {
    let config_path = explicit
        .map(Path::to_path_buf)
        .or_else(Config::default_path)
        .map(|p| {
            let exists = p.exists();
            return (p, exists);
        });
    let data_dir = config.storage_dir();
    let store = data_dir.clone().map(JsonStore::new);

    return CurrentState {
        bookmarks: store.as_ref().and_then(|s| return s.load_bookmarks().ok()).map(|b| return b.len()),
        config_path,
        data_dir,
        history: store.as_ref().and_then(|s| return s.load_history().ok()).map(|h| return h.len()),
    };
}

// ── Markdown output ───────────────────────────────────────────────────

/// Human-readable reference.
fn print_markdown(config: &Config, state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_forges();
    print_markdown_config(config);
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
}

/// Title, address forms, and commands.
fn print_markdown_header(version: &str) {
    print!(
        "\
# mdnav {version}

Location resolution and navigation for markdown: local files, URLs, and
files in forge-hosted repositories.

## Address Forms

    ./docs/guide.md                    local file, relative to the current document
    ~/notes/todo.md                    home-relative path
    file:///srv/docs/index.md          file URL
    https://example.com/README.md      remote document
    gh owner/repo[/path][@branch]      forge shorthand (README.md by default)
    gh owner repo [path]               spaced shorthand
    gh owner/repo:branch [path]        spaced shorthand with branch
    #heading                           anchor in the current document

## Commands

    mdnav view <address> [--toc]        Print a document
    mdnav toc <address>                 Print a document's headings and anchors
    mdnav resolve <input> [--from X]    Show how input is classified
    mdnav expand <shorthand>            Expand forge shorthand to a raw URL
    mdnav local [dir]                   List markdown files under a directory
    mdnav bookmarks list|add|remove|rename
    mdnav history list|remove|clear
    mdnav browse [address]              Interactive session
    mdnav info [--json]                 This reference

"
    );
}

/// Forge prefix table.
fn print_markdown_forges() {
    println!("## Forges\n");
    println!("| Prefixes | Forge |");
    println!("|----------|-------|");
    for forge in Forge::ALL {
        println!("| {} | {} |", forge.prefixes().join(", "), forge.name());
    }
    println!();
}

/// Effective configuration.
fn print_markdown_config(config: &Config) {
    print!(
        "\
## Configuration (config.toml)

    markdown_extensions = {:?}
    branch_candidates = {:?}
    query_forge_api = {}
    timeout_secs = {}
    max_history = {}
    cache_capacity = {}
    user_agent = {:?}

## Current State

",
        config.markdown_extensions,
        config.branch_candidates,
        config.query_forge_api,
        config.timeout_secs,
        config.max_history,
        config.cache_capacity,
        config.user_agent,
    );
}

/// Where things live and how much is saved.
fn print_markdown_state(state: &CurrentState) {
    match &state.config_path {
        Some((path, true)) => println!("Config:     {} (found)", path.display()),
        Some((path, false)) => println!("Config:     {} (not found, using defaults)", path.display()),
        None => println!("Config:     (no location)"),
    }
    match &state.data_dir {
        Some(dir) => println!("Data:       {}", dir.display()),
        None => println!("Data:       (none, nothing is saved)"),
    }
    match state.history {
        Some(n) => println!("History:    {n} entries"),
        None => println!("History:    (unreadable)"),
    }
    match state.bookmarks {
        Some(n) => println!("Bookmarks:  {n}"),
        None => println!("Bookmarks:  (unreadable)"),
    }
}

/// Exit code table.
fn print_markdown_exit_codes() {
    print!(
        "\
## Exit Codes

| Code | Meaning |
|------|---------|
| 0    | Success |
| 1    | Error (diagnostic printed to stderr) |
"
    );
}

// ── JSON output ───────────────────────────────────────────────────────

/// Top-level JSON document.
#[derive(Serialize)]
struct InfoJson<'a> {
    /// Effective configuration.
    config: &'a Config,
    /// Paths and counts.
    current_state: StateJson,
    /// Exit code meanings.
    exit_codes: Vec<ExitCodeInfo>,
    /// Recognised forges.
    forges: Vec<ForgeInfo>,
    /// Crate version.
    version: String,
}

/// One forge row.
#[derive(Serialize)]
struct ForgeInfo {
    /// Display name.
    name: String,
    /// Accepted shorthand prefixes.
    prefixes: Vec<String>,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Process exit status.
    code: u8,
    /// What it means.
    meaning: String,
}

/// JSON view of [`CurrentState`].
#[derive(Serialize)]
struct StateJson {
    /// Saved bookmarks.
    bookmarks: Option<usize>,
    /// Whether the config file exists.
    config_found: bool,
    /// Config file location.
    config_path: Option<PathBuf>,
    /// Data directory.
    data_dir: Option<PathBuf>,
    /// Saved history entries.
    history: Option<usize>,
}

/// Machine-readable reference.
fn print_json(config: &Config, state: &CurrentState) {
    let info = InfoJson {
        config,
        current_state: StateJson {
            bookmarks: state.bookmarks,
            config_found: state.config_path.as_ref().is_some_and(|(_, found)| return *found),
            config_path: state.config_path.as_ref().map(|(p, _)| return p.clone()),
            data_dir: state.data_dir.clone(),
            history: state.history,
        },
        exit_codes: vec![
            ExitCodeInfo { code: 0, meaning: "Success".to_string() },
            ExitCodeInfo { code: 1, meaning: "Error".to_string() },
        ],
        forges: Forge::ALL
            .into_iter()
            .map(|f| {
                return ForgeInfo {
                    name: f.name().to_string(),
                    prefixes: f.prefixes().iter().map(|p| return (*p).to_string()).collect(),
                };
            })
            .collect(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // serde_json::to_string_pretty won't fail on this structure.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
}
