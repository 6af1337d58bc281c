//! kvshell: an interactive shell for embedded ordered key-value stores.
//!
//! One process, one store. The shell opens the store's data directory
//! read-write and drops into a line-oriented command loop: `keys`, `get`,
//! `set`, `delete`, `exist`, `path`, `exit`, and `?` for help.
//!
//! # Locked stores
//!
//! Embedded stores admit a single writing process. When the data directory
//! is already held elsewhere, the shell does not give up: it opens a
//! read-only copy of the store under the system temp root and removes that
//! copy on exit. Inspection therefore always works; mutation requires
//! holding the real lock.
//!
//! # Crate Structure
//!
//! - [`core::store`]: the store handle (ordered `kv` table over SQLite)
//! - [`core::lock`]: open-failure classification (lock conflict vs fatal)
//! - [`core::mirror`]: byte-for-byte store directory cloning
//! - [`core::session`]: session lifecycle from open and fallback to shutdown
//! - [`core::repl`]: the command loop

pub mod core;

use crate::core::{error::ShellError, repl, session::StoreSession};

use clap::Parser;
use colored::Colorize;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "kvshell",
    version = env!("CARGO_PKG_VERSION"),
    about = "Interactive shell for embedded ordered key-value stores"
)]
struct Cli {
    /// Absolute path to the store's data directory.
    #[clap(short, long)]
    path: PathBuf,

    /// Open the store in read-only mode.
    #[clap(short, long)]
    readonly: bool,
}

pub fn run() -> Result<(), ShellError> {
    let cli = Cli::parse();

    let session = StoreSession::open(&cli.path, cli.readonly)?;

    println!("Welcome to {}.", "kvshell".bright_cyan().bold());
    println!("Enter '?' for a list of commands.");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let outcome = repl::run_loop(&session, stdin.lock(), &mut stdout.lock());

    // Close before purge, on every exit path, exactly once.
    session.shutdown();
    outcome
}
