//! Session lifecycle: primary open, lock-conflict fallback, shutdown.
//!
//! The session is the one value threaded from startup through the command
//! loop to shutdown. It carries the open store handle together with the
//! two facts the dispatcher and the shutdown path need: whether writes are
//! allowed, and whether the directory on disk is a temporary clone that
//! this process owes a cleanup for.

use crate::core::error::ShellError;
use crate::core::lock::{self, OpenFailure};
use crate::core::mirror;
use crate::core::store::{OpenMode, StoreHandle};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// The single live store handle for one shell run.
pub struct StoreSession {
    store: StoreHandle,
    path: PathBuf,
    read_only: bool,
    temporary_clone: bool,
}

impl StoreSession {
    /// Open the store at `path`, falling back to a read-only temporary
    /// clone when another process already holds it. Any failure other
    /// than a classified lock conflict aborts startup, and so does a
    /// failing fallback: there is no second fallback.
    pub fn open(path: &Path, read_only: bool) -> Result<Self, ShellError> {
        let mode = if read_only {
            OpenMode::ReadOnly
        } else {
            OpenMode::ReadWrite
        };
        match StoreHandle::open(path, mode) {
            Ok(store) => Ok(StoreSession {
                store,
                path: path.to_path_buf(),
                read_only,
                temporary_clone: false,
            }),
            Err(err) => match lock::classify_open_error(&err) {
                OpenFailure::Fatal => Err(err),
                OpenFailure::LockConflict => open_fallback(path, &err),
            },
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Effective path currently open: the primary directory, or the clone
    /// after a fallback.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_temporary_clone(&self) -> bool {
        self.temporary_clone
    }

    /// Close the store and purge the temporary clone if one was created.
    /// Consuming `self` makes the close run exactly once; the close comes
    /// first so no file under the clone is still held open when the tree
    /// goes away. Cleanup failures are swallowed: shutdown is not a place
    /// to fail loudly.
    pub fn shutdown(self) {
        self.store.close();
        if self.temporary_clone {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Clone the locked store and reopen the copy read-only, announcing the
/// substitution before the shell starts.
fn open_fallback(path: &Path, cause: &ShellError) -> Result<StoreSession, ShellError> {
    eprintln!(
        "{} {}",
        "store is held by another process:".yellow(),
        cause
    );
    let clone_path = mirror::clone_store_dir(path)?;
    println!("copied {} to {}", path.display(), clone_path.display());

    let store = match StoreHandle::open(&clone_path, OpenMode::ReadOnly) {
        Ok(store) => store,
        Err(err) => {
            // The copy is unusable; do not leave it behind.
            let _ = fs::remove_dir_all(&clone_path);
            return Err(err);
        }
    };
    println!("{}", "opened read-only copy".yellow());

    Ok(StoreSession {
        store,
        path: clone_path,
        read_only: true,
        temporary_clone: true,
    })
}
