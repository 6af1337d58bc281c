//! Byte-for-byte duplication of a store directory.
//!
//! The fallback path must hand the session a complete copy or nothing:
//! a clone that is missing files would present itself as a store with
//! less data than the original. Any copy failure therefore removes the
//! partial destination tree before the error propagates.

use crate::core::error::ShellError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix for clone directories under the system temp root.
const CLONE_PREFIX: &str = "kvshell-";

/// Copy the whole store tree under `source` into a fresh directory beneath
/// the system temp root and return its path. The destination is named from
/// the current time in nanoseconds and must not already exist.
pub fn clone_store_dir(source: &Path) -> Result<PathBuf, ShellError> {
    if !source.is_dir() {
        return Err(ShellError::CloneError(format!(
            "source {} is not a directory",
            source.display()
        )));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dest = std::env::temp_dir().join(format!("{CLONE_PREFIX}{nanos}"));

    if let Err(err) = copy_tree(source, &dest) {
        let _ = fs::remove_dir_all(&dest);
        return Err(err);
    }
    Ok(dest)
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), ShellError> {
    // create_dir, not create_dir_all: a pre-existing destination is a
    // collision, not something to merge into.
    fs::create_dir(dest)
        .map_err(|err| ShellError::CloneError(format!("create {}: {err}", dest.display())))?;
    #[cfg(unix)]
    {
        let meta = fs::metadata(source)
            .map_err(|err| ShellError::CloneError(format!("stat {}: {err}", source.display())))?;
        fs::set_permissions(dest, meta.permissions()).map_err(|err| {
            ShellError::CloneError(format!("set permissions on {}: {err}", dest.display()))
        })?;
    }

    let entries = fs::read_dir(source)
        .map_err(|err| ShellError::CloneError(format!("read {}: {err}", source.display())))?;
    for entry in entries {
        let entry = entry
            .map_err(|err| ShellError::CloneError(format!("read {}: {err}", source.display())))?;
        let entry_path = entry.path();
        let file_type = entry.file_type().map_err(|err| {
            ShellError::CloneError(format!("stat {}: {err}", entry_path.display()))
        })?;
        let target = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_tree(&entry_path, &target)?;
        } else if file_type.is_file() {
            fs::copy(&entry_path, &target).map_err(|err| {
                ShellError::CloneError(format!("copy {}: {err}", entry_path.display()))
            })?;
        } else {
            // Store directories hold plain files and directories only.
            return Err(ShellError::CloneError(format!(
                "unsupported entry {}",
                entry_path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    // Tests that create real clones under the shared system temp root are
    // serialized so they can reason about its contents.
    fn temp_root_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn clone_copies_nested_tree_byte_for_byte() {
        let _guard = temp_root_lock().lock().expect("lock temp root");
        let tmp = TempDir::new().expect("tempdir");
        let source = tmp.path().join("db");
        fs::create_dir_all(source.join("sub")).expect("mkdir");
        fs::write(source.join("store.db"), b"\x00\x01binary\xff").expect("write");
        fs::write(source.join("sub/aux"), b"aux contents").expect("write");

        let clone = clone_store_dir(&source).expect("clone");
        assert!(clone.file_name().is_some_and(|name| {
            name.to_string_lossy().starts_with(CLONE_PREFIX)
        }));
        assert_eq!(
            fs::read(clone.join("store.db")).expect("read"),
            b"\x00\x01binary\xff"
        );
        assert_eq!(
            fs::read(clone.join("sub/aux")).expect("read"),
            b"aux contents"
        );

        fs::remove_dir_all(&clone).expect("cleanup");
    }

    #[test]
    fn missing_source_is_a_clone_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = clone_store_dir(&tmp.path().join("nope")).expect_err("must fail");
        assert!(matches!(err, ShellError::CloneError(_)), "{err}");
    }

    #[test]
    fn existing_destination_is_refused() {
        let tmp = TempDir::new().expect("tempdir");
        let source = tmp.path().join("src");
        let dest = tmp.path().join("dst");
        fs::create_dir_all(&source).expect("mkdir");
        fs::create_dir_all(&dest).expect("mkdir");

        let err = copy_tree(&source, &dest).expect_err("must refuse");
        assert!(matches!(err, ShellError::CloneError(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn failed_copy_leaves_no_partial_clone() {
        let _guard = temp_root_lock().lock().expect("lock temp root");
        let tmp = TempDir::new().expect("tempdir");
        let source = tmp.path().join("db");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("store.db"), b"data").expect("write");
        std::os::unix::fs::symlink("/nonexistent", source.join("dangling")).expect("symlink");

        let before: Vec<_> = fs::read_dir(std::env::temp_dir())
            .expect("read tmp")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();

        let err = clone_store_dir(&source).expect_err("symlink must abort the clone");
        assert!(matches!(err, ShellError::CloneError(_)), "{err}");

        let after: Vec<_> = fs::read_dir(std::env::temp_dir())
            .expect("read tmp")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        let leaked: Vec<_> = after
            .iter()
            .filter(|name| {
                name.to_string_lossy().starts_with(CLONE_PREFIX) && !before.contains(name)
            })
            .collect();
        assert!(leaked.is_empty(), "partial clone left behind: {leaked:?}");
    }
}
