//! Archive Loader (spec section 4.1): opens a save's outer zip and extracts
//! the `meta` and `gamestate` text members. The only module in this crate
//! permitted to touch the filesystem.

use crate::contracts::{ArchiveLoader, LoadedSave};
use crate::errors::ParserError;
use crate::validation::validate_archive_path;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const META_MEMBER: &str = "meta";
const GAMESTATE_MEMBER: &str = "gamestate";

/// Default archive loader: a real zip file on disk.
pub struct ZipArchiveLoader;

impl ArchiveLoader for ZipArchiveLoader {
    fn load(&self, path: &Path) -> Result<LoadedSave, ParserError> {
        let path = validate_archive_path(path)
            .map_err(|e| ParserError::archive(e.to_string()))?;

        let file = File::open(&path)
            .map_err(|e| ParserError::archive(format!("cannot open '{}': {e}", path.display())))?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ParserError::archive(format!("not a valid save archive: {e}")))?;

        let meta = read_member(&mut archive, META_MEMBER)?;
        let gamestate = read_member(&mut archive, GAMESTATE_MEMBER)?;

        Ok(LoadedSave { meta, gamestate })
    }
}

fn read_member(archive: &mut zip::ZipArchive<File>, name: &str) -> Result<String, ParserError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ParserError::archive(format!("archive is missing required member '{name}'")))?;

    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| ParserError::archive(format!("failed to read member '{name}': {e}")))?;

    // Lossy decode per spec section 4.1: the source format is not
    // strictly Unicode-clean, so malformed bytes are replaced rather than
    // rejecting the whole archive.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_archive(path: &Path, meta: &str, gamestate: &str) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        writer.start_file(META_MEMBER, options).unwrap();
        writer.write_all(meta.as_bytes()).unwrap();
        writer.start_file(GAMESTATE_MEMBER, options).unwrap();
        writer.write_all(gamestate.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn loads_both_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sav");
        write_test_archive(&path, "version=\"3.9\"", "country={ }");

        let loader = ZipArchiveLoader;
        let loaded = loader.load(&path).unwrap();
        assert_eq!(loaded.meta, "version=\"3.9\"");
        assert_eq!(loaded.gamestate, "country={ }");
    }

    #[test]
    fn missing_member_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sav");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer.start_file(META_MEMBER, zip::write::FileOptions::default()).unwrap();
        writer.write_all(b"version=\"3.9\"").unwrap();
        writer.finish().unwrap();

        let loader = ZipArchiveLoader;
        let err = loader.load(&path).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn nonexistent_file_is_archive_error() {
        let loader = ZipArchiveLoader;
        let err = loader.load(Path::new("/nonexistent/path.sav")).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn traversal_path_rejected_before_filesystem_access() {
        let loader = ZipArchiveLoader;
        let err = loader.load(Path::new("../../../etc/passwd")).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }
}
