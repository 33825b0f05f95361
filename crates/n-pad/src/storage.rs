//! Crash-safe persistence.
//!
//! A save never writes the target in place. The text goes to a temporary file
//! in the **same directory** as the target, is flushed to disk, and is then
//! renamed over the target. Rename within one filesystem is atomic, so a
//! reader sees either the old file or the new one, never a torn write. If any
//! step fails the temporary file is deleted and the target keeps its previous
//! bytes.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::error::SaveError;

/// Where the autosave engine sends its writes.
///
/// [`FsStorage`] is the real filesystem. Tests and embedders can supply
/// their own implementation, but it must keep the same contract: on `Err`,
/// the target is unchanged.
pub trait Storage {
    /// Atomically replace `target` with `contents`.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`] describing the step that failed.
    fn write_atomic(&mut self, target: &Path, contents: &str) -> Result<(), SaveError>;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn write_atomic(&mut self, target: &Path, contents: &str) -> Result<(), SaveError> {
        write_atomic(target, contents)
    }
}

/// Write `contents` as UTF-8 to a sibling temp file, fsync it, and rename it
/// over `target`.
///
/// An existing target keeps its permissions. A new file gets the same mode a
/// plain create would give it.
///
/// # Errors
///
/// - [`SaveError::TempFile`] if the target's directory does not accept a new
///   file (missing, read-only).
/// - [`SaveError::Write`] if writing or syncing the temp file fails.
/// - [`SaveError::Replace`] if the rename fails (e.g. the target is a
///   directory).
pub fn write_atomic(target: &Path, contents: &str) -> Result<(), SaveError> {
    let tmp = stage(target, contents)?;
    tmp.persist(target).map_err(|err| SaveError::Replace {
        path: target.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

/// Everything before the rename: a synced temp file next to `target` holding
/// `contents`, with the target's permissions. Dropping the returned file
/// deletes it.
pub(crate) fn stage(target: &Path, contents: &str) -> Result<NamedTempFile, SaveError> {
    let dir = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let existing = fs::metadata(target)
        .ok()
        .filter(fs::Metadata::is_file)
        .map(|meta| meta.permissions());

    let mut builder = Builder::new();
    builder.prefix(".n-pad-").suffix(".tmp");
    if existing.is_none() {
        if let Some(mode) = create_permissions() {
            builder.permissions(mode);
        }
    }
    let mut tmp = builder.tempfile_in(dir).map_err(|source| SaveError::TempFile {
        dir: dir.to_path_buf(),
        source,
    })?;

    // Dropping `tmp` on any early return deletes the temp file.
    let written = existing
        .map_or(Ok(()), |perms| tmp.as_file().set_permissions(perms))
        .and_then(|()| tmp.write_all(contents.as_bytes()))
        .and_then(|()| tmp.as_file().sync_all());
    if let Err(source) = written {
        return Err(SaveError::Write {
            path: target.to_path_buf(),
            source,
        });
    }
    Ok(tmp)
}

/// Mode for a file that does not exist yet. The umask applies, as it does
/// for `File::create`.
#[cfg(unix)]
fn create_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
const fn create_permissions() -> Option<fs::Permissions> {
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;

    use pretty_assertions::assert_eq;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        write_atomic(&target, "hello").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        fs::write(&target, "old content that is longer").unwrap();
        write_atomic(&target, "new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn writes_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("memo.txt");
        write_atomic(&target, "日本語 café\n").unwrap();
        assert_eq!(fs::read(&target).unwrap(), "日本語 café\n".as_bytes());
    }

    #[test]
    fn leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        write_atomic(&target, "one").unwrap();
        write_atomic(&target, "two").unwrap();
        assert_eq!(entries(dir.path()), vec!["notes.txt".to_string()]);
    }

    #[test]
    fn missing_directory_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no-such-dir").join("notes.txt");
        let err = write_atomic(&target, "text").unwrap_err();
        assert!(matches!(err, SaveError::TempFile { .. }));
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!target.exists());
    }

    #[test]
    fn failed_rename_keeps_target_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file.
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inside.txt"), "keep me").unwrap();

        let err = write_atomic(&target, "text").unwrap_err();
        assert!(matches!(err, SaveError::Replace { .. }));
        assert!(target.is_dir());
        assert_eq!(
            fs::read_to_string(target.join("inside.txt")).unwrap(),
            "keep me"
        );
        assert_eq!(entries(dir.path()), vec!["occupied".to_string()]);
    }

    #[test]
    fn dropped_stage_leaves_existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        fs::write(&target, "original bytes\n").unwrap();

        let tmp = stage(&target, "replacement").unwrap();
        assert_eq!(entries(dir.path()).len(), 2);
        assert_eq!(fs::read_to_string(tmp.path()).unwrap(), "replacement");
        drop(tmp);

        assert_eq!(fs::read(&target).unwrap(), b"original bytes\n");
        assert_eq!(entries(dir.path()), vec!["notes.txt".to_string()]);
    }

    // -- Permissions ------------------------------------------------------

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn replace_keeps_target_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        for bits in [0o644, 0o640, 0o600, 0o664] {
            let target = dir.path().join(format!("shared-{bits:o}.txt"));
            fs::write(&target, "old").unwrap();
            fs::set_permissions(&target, fs::Permissions::from_mode(bits)).unwrap();

            write_atomic(&target, "new").unwrap();
            assert_eq!(fs::read_to_string(&target).unwrap(), "new");
            assert_eq!(mode(&target), bits, "mode {bits:o}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn new_file_gets_plain_create_mode() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        fs::write(&plain, "").unwrap();

        let target = dir.path().join("fresh.txt");
        write_atomic(&target, "text").unwrap();
        assert_eq!(mode(&target), mode(&plain));
    }

    #[test]
    fn fs_storage_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        FsStorage.write_atomic(&target, "via trait").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "via trait");
    }
}
