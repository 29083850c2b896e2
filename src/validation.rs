//! Path and protocol-argument validation helpers.
//!
//! Grounded on `validation.rs.ref`'s `pub mod path` (length bounds and
//! traversal checks applied before anything touches the filesystem).

use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};

pub const MAX_PATH_LENGTH: usize = 4096;
pub const MAX_SECTION_NAME_LENGTH: usize = 256;

/// Validates an archive path before the archive loader opens it: rejects
/// empty paths, paths over the length bound, and `..` traversal segments.
/// This is the only place in the crate that reasons about paths before a
/// filesystem call is made.
pub fn validate_archive_path(path: &Path) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    ensure!(!text.is_empty(), "archive path cannot be empty");
    ensure!(
        text.len() <= MAX_PATH_LENGTH,
        "archive path exceeds {} bytes",
        MAX_PATH_LENGTH
    );
    ensure!(
        !path.components().any(|c| c.as_os_str() == ".."),
        "archive path cannot contain '..' traversal segments"
    );
    Ok(path.to_path_buf())
}

/// Validates a section name argument from a request before it reaches the
/// query engine.
pub fn validate_section_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "section name cannot be empty");
    ensure!(
        name.len() <= MAX_SECTION_NAME_LENGTH,
        "section name exceeds {} bytes",
        MAX_SECTION_NAME_LENGTH
    );
    ensure!(
        name.bytes().all(|b| b != b'\n' && b != b'\r'),
        "section name cannot contain line breaks"
    );
    Ok(())
}

/// Validates an entry key argument.
pub fn validate_entry_key(key: &str) -> Result<()> {
    ensure!(!key.is_empty(), "entry key cannot be empty");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_paths() {
        assert!(validate_archive_path(Path::new("../escape.sav")).is_err());
        assert!(validate_archive_path(Path::new("saves/../../escape.sav")).is_err());
    }

    #[test]
    fn accepts_plain_paths() {
        assert!(validate_archive_path(Path::new("saves/empire.sav")).is_ok());
    }

    #[test]
    fn section_name_rejects_line_breaks() {
        assert!(validate_section_name("country\n").is_err());
        assert!(validate_section_name("country").is_ok());
    }

    #[test]
    fn entry_key_rejects_empty() {
        assert!(validate_entry_key("").is_err());
        assert!(validate_entry_key("42").is_ok());
    }
}
