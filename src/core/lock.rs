//! Classification of store-open failures.
//!
//! The open path needs exactly one decision: did the open fail because
//! another process holds the store, or for any other reason? SQLite
//! reports the former with structured busy/locked result codes, so those
//! are checked first. The textual signatures are a last resort for errors
//! that arrive without a structured code, and only on platforms whose
//! wording is known. Everything unmatched stays fatal: a false negative
//! merely costs the fallback, while a false positive would hide a real
//! failure behind a silently cloned store.

use crate::core::error::ShellError;
use regex::RegexBuilder;
use rusqlite::ErrorCode;

/// Verdict on a failed primary open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// Another process holds the store; a read-only clone is worth trying.
    LockConflict,
    /// Anything else. Surface the error verbatim and abort startup.
    Fatal,
}

pub fn classify_open_error(err: &ShellError) -> OpenFailure {
    let ShellError::RusqliteError(sql_err) = err else {
        return OpenFailure::Fatal;
    };
    if let rusqlite::Error::SqliteFailure(code, _) = sql_err {
        if matches!(
            code.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ) {
            return OpenFailure::LockConflict;
        }
    }
    if lock_signature_matches(&sql_err.to_string()) {
        return OpenFailure::LockConflict;
    }
    OpenFailure::Fatal
}

/// Platform-specific message patterns for lock contention. Platforms not
/// listed here get no textual matching at all.
fn lock_signature_matches(message: &str) -> bool {
    let pattern = if cfg!(any(target_os = "linux", target_os = "macos")) {
        r"resource temporarily unavailable|database is locked"
    } else if cfg!(windows) {
        r"being used by another process|database is locked"
    } else {
        return false;
    };
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}
