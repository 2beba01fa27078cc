use std::fmt::Write as _;

use crate::error::Error;
use crate::forge::Forge;

/// ANSI bold on.
const BOLD: &str = "\x1b[1m";
/// ANSI attributes off.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::AnchorNotFound { anchor, location } => format!("\
# Error: Anchor Not Found

`#{anchor}` is not a heading in `{location}`.

## Fix

List the document's headings:

    mdnav toc {location}
"),
        Error::BranchNotFound { forge, owner, path, repo, tried } => {
            render_branch_not_found(forge, owner, repo, path, tried)
        },
        Error::ConfigNotFound { path } => format!("\
# Error: Config Not Found

`{}` does not exist.

## Fix

Create it, or drop `--config` and `MDNAV_CONFIG` to use defaults.
", path.display()),
        Error::InvalidAddress { input, reason } => render_invalid_address(input, reason),
        Error::NotFound { location, status } => {
            let status = status.map(|s| return format!(" (HTTP {s})")).unwrap_or_default();
            format!("\
# Error: Not Found

`{location}` does not exist{status}.
")
        },
        Error::NotAFile { path } => format!("\
# Error: Not A File

`{}` is a directory or special file.

## Fix

List the markdown files inside it:

    mdnav local {}
", path.display(), path.display()),
        Error::ParseFailed { location, reason } => format!("\
# Error: Parse Failed

Could not parse `{location}`: {reason}
"),
        Error::Transport { reason, url } => format!("\
# Error: Transport

Request to `{url}` failed: {reason}

## Fix

Check the network connection, or raise `timeout_secs` in the config file.
"),
        Error::TomlDe(err) => format!("\
# Error: Invalid Config

{err}
"),
        Error::EmptyHistory | Error::HistoryIndex { .. } | Error::Io(_) | Error::Json(_) | Error::NoHistory => {
            format!("\
# Error

{e}
")
        },
    };
}

/// Branch probing came up empty.
fn render_branch_not_found(forge: &str, owner: &str, repo: &str, path: &str, tried: &[String]) -> String {
    let prefix = Forge::ALL
        .into_iter()
        .find(|f| return f.name() == forge)
        .map_or("gh", Forge::prefix);

    let mut out = format!("\
# Error: Branch Not Found

`{path}` was not found in {forge} repository `{owner}/{repo}`.

## Branches tried

");
    for branch in tried {
        let _ = writeln!(out, "- `{branch}`");
    }
    let _ = write!(out, "\
\n## Fix

Name the branch explicitly:

    mdnav view \"{prefix} {owner}/{repo}/{path}@<branch>\"
");
    return out;
}

/// Input matched no address shape.
fn render_invalid_address(input: &str, reason: &str) -> String {
    let prefixes = Forge::ALL
        .into_iter()
        .map(|f| return f.prefixes().join("`, `"))
        .collect::<Vec<_>>()
        .join("`, `");
    return format!("\
# Error: Invalid Address

`{input}`: {reason}

## Accepted forms

    ./docs/guide.md                      local file, relative or absolute
    https://example.com/README.md        remote URL
    gh owner/repo[/path][@branch]        forge shorthand
    #heading                             anchor in the current document

Forge prefixes: `{prefixes}`.
");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn branch_not_found_lists_tried_branches() {
        let md = render_error(&Error::BranchNotFound {
            forge: "GitLab",
            owner: "foo".to_string(),
            path: "README.md".to_string(),
            repo: "bar".to_string(),
            tried: vec!["main".to_string(), "master".to_string()],
        });

        assert!(md.starts_with("# Error: Branch Not Found"));
        assert!(md.contains("- `master`"));
        assert!(md.contains("gl foo/bar/README.md@<branch>"));
    }

    #[test]
    fn invalid_address_shows_accepted_forms() {
        let md = render_error(&Error::invalid("ftp://x", "unsupported scheme `ftp`"));

        assert!(md.contains("## Accepted forms"));
        assert!(md.contains("`codeberg`"));
    }

    #[test]
    fn boundary_errors_render_generically() {
        assert_eq!(render_error(&Error::NoHistory), "# Error\n\nno history in that direction\n");
    }
}
