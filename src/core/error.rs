use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Clone error: {0}")]
    CloneError(String),
    #[error("Open error: {0}")]
    OpenError(String),
    #[error("Path error: {0}")]
    PathError(String),
}
