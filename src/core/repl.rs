//! The interactive command loop.
//!
//! One line is read, fully dispatched, and completed before the next read.
//! End-of-input is a normal termination path. Handler errors are printed
//! to the user and never terminate the loop; only the `exit` verb and EOF
//! do.

use crate::core::error::ShellError;
use crate::core::session::StoreSession;
use std::io::{self, BufRead, Write};

/// Fixed command set, parsed once per line and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Help,
    Exit,
    Path,
    Keys,
    Get,
    Set,
    Delete,
    Exist,
    Unknown,
}

impl Verb {
    fn parse(token: &str) -> Verb {
        if token == "?" {
            return Verb::Help;
        }
        match token.to_ascii_uppercase().as_str() {
            "HELP" => Verb::Help,
            "EXIT" => Verb::Exit,
            "PATH" => Verb::Path,
            "KEYS" => Verb::Keys,
            "GET" => Verb::Get,
            "SET" => Verb::Set,
            "DELETE" => Verb::Delete,
            "EXIST" => Verb::Exist,
            _ => Verb::Unknown,
        }
    }
}

/// What the loop does after a dispatched line.
enum Flow {
    Continue,
    Exit,
}

/// Read lines from `input` and dispatch them against `session`, writing
/// all user-facing output to `out`.
pub fn run_loop<R, W>(session: &StoreSession, mut input: R, out: &mut W) -> Result<(), ShellError>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            // End of input: normal termination.
            writeln!(out)?;
            return Ok(());
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).trim_matches(' ');
        if trimmed.is_empty() {
            continue;
        }

        // Split on single spaces. Runs of spaces yield empty argument
        // tokens on purpose: the store accepts empty keys and values, so
        // the tokenizer does not collapse them.
        let mut tokens = trimmed.split(' ');
        let verb = tokens.next().unwrap_or_default();
        let args: Vec<&str> = tokens.collect();

        match dispatch(session, verb, &args, out)? {
            Flow::Exit => return Ok(()),
            Flow::Continue => {}
        }
    }
}

fn dispatch<W: Write>(
    session: &StoreSession,
    verb: &str,
    args: &[&str],
    out: &mut W,
) -> io::Result<Flow> {
    match Verb::parse(verb) {
        Verb::Help => print_help(out)?,
        Verb::Exit => return Ok(Flow::Exit),
        Verb::Path => writeln!(out, "store path: {}", session.path().display())?,
        Verb::Keys => keys(session, args, out)?,
        Verb::Get => get(session, args, out)?,
        Verb::Set => set(session, args, out)?,
        Verb::Delete => delete(session, args, out)?,
        Verb::Exist => exist(session, args, out)?,
        Verb::Unknown => writeln!(out, "unknown command")?,
    }
    Ok(Flow::Continue)
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "\t?                \thelp menu")?;
    writeln!(out, "\texit             \texit the shell")?;
    writeln!(out, "\tpath             \tprint the store path")?;
    writeln!(out, "\tkeys [prefix|*]  \tprint keys, all or by prefix")?;
    writeln!(out, "\tget key          \tprint the value of key")?;
    writeln!(out, "\tset key value    \tset key to value")?;
    writeln!(out, "\tdelete key       \tdelete key")?;
    writeln!(out, "\texist key        \tprint whether key exists")?;
    Ok(())
}

fn keys<W: Write>(session: &StoreSession, args: &[&str], out: &mut W) -> io::Result<()> {
    let prefix = match args.first() {
        None | Some(&"*") => None,
        Some(p) => Some(p.as_bytes()),
    };
    let scan = session.store().for_each_key(prefix, |key| {
        writeln!(out, "{}", String::from_utf8_lossy(key))?;
        Ok(())
    });
    if let Err(err) = scan {
        writeln!(out, "{err}")?;
    }
    Ok(())
}

fn get<W: Write>(session: &StoreSession, args: &[&str], out: &mut W) -> io::Result<()> {
    let Some(key) = args.first() else {
        return writeln!(out, "key required");
    };
    match session.store().get(key.as_bytes()) {
        Ok(Some(value)) => writeln!(out, "{}", String::from_utf8_lossy(&value)),
        Ok(None) => writeln!(out, "key not found"),
        Err(err) => writeln!(out, "{err}"),
    }
}

fn set<W: Write>(session: &StoreSession, args: &[&str], out: &mut W) -> io::Result<()> {
    if args.len() < 2 {
        return writeln!(out, "parameter error");
    }
    if session.read_only() {
        return writeln!(out, "readonly mode");
    }
    match session.store().put(args[0].as_bytes(), args[1].as_bytes()) {
        Ok(()) => writeln!(out, "OK"),
        Err(err) => writeln!(out, "{err}"),
    }
}

fn delete<W: Write>(session: &StoreSession, args: &[&str], out: &mut W) -> io::Result<()> {
    let Some(key) = args.first() else {
        return writeln!(out, "key required");
    };
    if session.read_only() {
        return writeln!(out, "readonly mode");
    }
    match session.store().delete(key.as_bytes()) {
        Ok(()) => writeln!(out, "OK"),
        Err(err) => writeln!(out, "{err}"),
    }
}

fn exist<W: Write>(session: &StoreSession, args: &[&str], out: &mut W) -> io::Result<()> {
    let Some(key) = args.first() else {
        return writeln!(out, "key required");
    };
    match session.store().has(key.as_bytes()) {
        Ok(found) => writeln!(out, "{found}"),
        Err(err) => writeln!(out, "{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_case_insensitively() {
        assert_eq!(Verb::parse("get"), Verb::Get);
        assert_eq!(Verb::parse("GET"), Verb::Get);
        assert_eq!(Verb::parse("GeT"), Verb::Get);
        assert_eq!(Verb::parse("DeLeTe"), Verb::Delete);
    }

    #[test]
    fn question_mark_and_help_are_both_help() {
        assert_eq!(Verb::parse("?"), Verb::Help);
        assert_eq!(Verb::parse("help"), Verb::Help);
    }

    #[test]
    fn unrecognized_verbs_are_unknown() {
        assert_eq!(Verb::parse("list"), Verb::Unknown);
        assert_eq!(Verb::parse(""), Verb::Unknown);
        assert_eq!(Verb::parse("??"), Verb::Unknown);
    }
}
