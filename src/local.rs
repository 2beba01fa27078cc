//! Local markdown discovery for the `local` command.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;
use crate::types::ResolvedLocation;

/// Whether a directory entry is hidden (dot-prefixed). The walk root never is.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
}

/// List markdown files under `root`, sorted by path.
///
/// Hidden files and directories are skipped. Unreadable subdirectories are
/// skipped rather than failing the whole walk.
///
/// # Errors
///
/// Returns `Error::NotFound` if `root` does not exist and
/// `Error::NotAFile` if it is not a directory.
pub fn markdown_files(root: &Path, config: &Config) -> Result<Vec<PathBuf>, Error> {
    let meta = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound {
                location: ResolvedLocation::Local(root.to_path_buf()),
                status: None,
            });
        },
        Err(e) => return Err(Error::Io(e)),
    };
    if !meta.is_dir() {
        return Err(Error::NotAFile {
            path: root.to_path_buf(),
        });
    }

    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && config.is_markdown(e.path()))
        .map(DirEntry::into_path)
        .collect();
    return Ok(files);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn lists_markdown_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("README.md"), "# r").unwrap();
        std::fs::write(root.join("docs/guide.markdown"), "# g").unwrap();
        std::fs::write(root.join("docs/main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join(".git/notes.md"), "# hidden").unwrap();
        std::fs::write(root.join(".draft.md"), "# hidden").unwrap();

        let files = markdown_files(root, &Config::default()).unwrap();
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(relative, vec![PathBuf::from("README.md"), PathBuf::from("docs/guide.markdown")]);
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let err = markdown_files(&dir.path().join("nope"), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
