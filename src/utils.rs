//! Utility functions for directory management, artifact output and diffs
//!
//! This module provides helper functions following the XDG Base Directory specification
//! for portable configuration and log storage across Linux distributions.
//!
//! # Directory Structure
//!
//! - Config: `~/.config/aclgen/` - User configuration (`config.json`)
//! - State: `~/.local/state/aclgen/` - Log file written with `--log-file`
//!
//! # Example
//!
//! ```
//! use aclgen::utils::{checksum, write_atomic};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("edge.eos");
//! write_atomic(&path, "ip access-list edge\n").unwrap();
//! assert_eq!(checksum(&std::fs::read_to_string(&path).unwrap()).len(), 64);
//! ```

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "aclgen", "aclgen").map(|pd| pd.config_dir().to_path_buf())
}

pub fn get_state_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "aclgen", "aclgen")
        .and_then(|pd| pd.state_dir().map(std::path::Path::to_path_buf))
}

pub fn ensure_state_dir() -> std::io::Result<Option<PathBuf>> {
    let Some(dir) = get_state_dir() else {
        return Ok(None);
    };

    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        let mut builder = DirBuilder::new();
        builder.mode(0o700); // User read/write/execute only
        builder.recursive(true);
        builder.create(&dir)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(Some(dir))
}

/// Writes `contents` to `path` using an atomic write pattern.
/// 1. Writes to a temporary file in the destination directory.
/// 2. Flushes it to disk.
/// 3. Atomically renames it over the target path.
///
/// A reader therefore sees either the previous artifact or the complete new
/// one, never a truncated file.
///
/// # Errors
///
/// Returns an I/O error if the directory is not writable or the rename
/// fails.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("Disk full: cannot write {}. Free up space and try again.", path.display()),
            )
        } else {
            e.error
        }
    })?;
    Ok(())
}

/// Returns a unified line diff from `old` to `new`, or `None` when the
/// texts are identical.
pub fn compute_diff(old: &str, new: &str, old_name: &str, new_name: &str) -> Option<String> {
    if old == new {
        return None;
    }
    let diff = similar::TextDiff::from_lines(old, new);
    Some(
        diff.unified_diff()
            .context_radius(3)
            .header(old_name, new_name)
            .to_string(),
    )
}

/// Computes the SHA-256 checksum of a rendered artifact as lowercase hex.
pub fn checksum(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    format!("{:x}", hasher.finalize())
}
