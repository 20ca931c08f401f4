//! Input resolution: validate single files and list batch directories.
//!
//! PDFs are checked for the `%PDF` magic bytes before pdfium sees them so a
//! saved HTML error page from the portal produces a clear error instead of an
//! empty extraction.

use crate::error::DiarioError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_pdf(path: &Path) -> Result<PathBuf, DiarioError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(DiarioError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(DiarioError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiarioError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DiarioError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Read a UTF-8 text input.
pub fn read_text(path: &Path) -> Result<String, DiarioError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DiarioError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DiarioError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DiarioError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Regular files in `dir` with extension `ext` (case-insensitive), sorted by name.
///
/// Subdirectories are not descended into.
pub fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, DiarioError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DiarioError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_extension(p, ext))
        .collect();
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Move `from` into `dir`, keeping its file name.
///
/// An existing file in `dir` is never replaced: the moved file gets the first
/// free `<stem>_N.<ext>` name instead. Falls back to copy + remove when a
/// rename is not possible (different filesystems).
pub fn move_into(from: &Path, dir: &Path) -> Result<PathBuf, DiarioError> {
    let name = from
        .file_name()
        .ok_or_else(|| DiarioError::Internal(format!("no file name in '{}'", from.display())))?;
    let to = free_target(dir, Path::new(name));
    let map = |e: std::io::Error| DiarioError::MoveFailed {
        from: from.to_path_buf(),
        to: to.clone(),
        source: e,
    };

    if std::fs::rename(from, &to).is_err() {
        std::fs::copy(from, &to).map_err(map)?;
        std::fs::remove_file(from).map_err(map)?;
    }
    debug!("Moved {} → {}", from.display(), to.display());
    Ok(to)
}

fn free_target(dir: &Path, name: &Path) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
