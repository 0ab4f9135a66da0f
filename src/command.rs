//! Interactive commands.
//!
//! This module defines [`Command`], a line of user input parsed into one
//! [`Manager`] call. Arguments are separated by whitespace and lists by commas.
//!
//! # Overview
//!
//! - `get <db> <table> <fields> <value>`
//! - `find <db> <table> <op> <fields> <values> [limit] [offset]`
//! - `insert <db> <table> <fields> <values>`
//! - `update <db> <table> <op> <fields> <values> <new_values> [limit]`
//! - `incr|decr <db> <table> <op> <fields> <values> [steps] [limit]`
//! - `delete <db> <table> <op> <fields> <values> [limit]`
//! - `.purge`, `.exit`
//!
//! Appending `?` to a modifying command (`update?`, `delete?`, ...) prints the
//! original rows instead of the affected-row count.
//!
//! # Example
//! ```rust
//! use hsclient::Command;
//!
//! let cmd: Command = "get db users id,name 1".try_into().unwrap();
//! assert!(matches!(cmd, Command::Get { .. }));
//! ```

use thiserror::Error;

use crate::{
    error::HsError,
    manager::{Manager, Modified, NamedRow, QueryOptions},
    protocol::ModifyKind,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] HsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        db: String,
        table: String,
        fields: Vec<String>,
        value: String,
    },
    Find {
        db: String,
        table: String,
        op: String,
        fields: Vec<String>,
        values: Vec<String>,
        limit: usize,
        offset: usize,
    },
    Insert {
        db: String,
        table: String,
        fields: Vec<String>,
        values: Vec<String>,
    },
    Modify {
        kind: ModifyKind,
        return_original: bool,
        db: String,
        table: String,
        op: String,
        fields: Vec<String>,
        values: Vec<String>,
        modify_values: Vec<String>,
        limit: usize,
    },
    /// Drop every connection and opened index.
    Purge,
    Exit,
}

fn list(s: &str) -> Vec<String> {
    s.split(',').map(str::to_string).collect()
}

fn refs(v: &[String]) -> Vec<&str> {
    v.iter().map(String::as_str).collect()
}

fn number(command: &str, arg: Option<&&str>, default: usize) -> Result<usize, CommandError> {
    match arg {
        None => Ok(default),
        Some(s) => s
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidCommandArguments {
                command: command.to_string(),
                reason: format!("'{s}' is not a non-negative integer"),
            }),
    }
}

fn arity(command: &str, parts: &[&str], min: usize, max: usize, usage: &str) -> Result<(), CommandError> {
    if parts.len() < min || parts.len() > max {
        return Err(CommandError::InvalidCommandArguments {
            command: command.to_string(),
            reason: format!("usage: {usage}"),
        });
    }
    Ok(())
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parts = value.split_whitespace().collect::<Vec<&str>>();
        let Some((name, args)) = parts.split_first() else {
            return Err(CommandError::Empty);
        };

        match *name {
            ".exit" => Ok(Command::Exit),
            ".purge" => Ok(Command::Purge),
            "get" => {
                arity(name, args, 4, 4, "get <db> <table> <fields> <value>")?;
                Ok(Command::Get {
                    db: args[0].to_string(),
                    table: args[1].to_string(),
                    fields: list(args[2]),
                    value: args[3].to_string(),
                })
            }
            "find" => {
                arity(
                    name,
                    args,
                    5,
                    7,
                    "find <db> <table> <op> <fields> <values> [limit] [offset]",
                )?;
                Ok(Command::Find {
                    db: args[0].to_string(),
                    table: args[1].to_string(),
                    op: args[2].to_string(),
                    fields: list(args[3]),
                    values: list(args[4]),
                    limit: number(name, args.get(5), 1)?,
                    offset: number(name, args.get(6), 0)?,
                })
            }
            "insert" => {
                arity(name, args, 4, 4, "insert <db> <table> <fields> <values>")?;
                let fields = list(args[2]);
                let values = list(args[3]);
                if fields.len() != values.len() {
                    return Err(CommandError::InvalidCommandArguments {
                        command: name.to_string(),
                        reason: format!("{} fields but {} values", fields.len(), values.len()),
                    });
                }
                Ok(Command::Insert {
                    db: args[0].to_string(),
                    table: args[1].to_string(),
                    fields,
                    values,
                })
            }
            s => {
                let (base, return_original) = match s.strip_suffix('?') {
                    Some(base) => (base, true),
                    None => (s, false),
                };
                let kind = match base {
                    "update" => ModifyKind::Update,
                    "incr" => ModifyKind::Increment,
                    "decr" => ModifyKind::Decrement,
                    "delete" => ModifyKind::Delete,
                    _ => return Err(CommandError::UnrecognizedCommand(s.to_string())),
                };

                let (modify_values, limit) = match kind {
                    ModifyKind::Update => {
                        arity(
                            s,
                            args,
                            6,
                            7,
                            "update <db> <table> <op> <fields> <values> <new_values> [limit]",
                        )?;
                        (list(args[5]), number(s, args.get(6), 1)?)
                    }
                    ModifyKind::Increment | ModifyKind::Decrement => {
                        arity(
                            s,
                            args,
                            5,
                            7,
                            &format!("{base} <db> <table> <op> <fields> <values> [steps] [limit]"),
                        )?;
                        let steps = args.get(5).map(|s| list(s)).unwrap_or_default();
                        (steps, number(s, args.get(6), 1)?)
                    }
                    ModifyKind::Delete => {
                        arity(
                            s,
                            args,
                            5,
                            6,
                            "delete <db> <table> <op> <fields> <values> [limit]",
                        )?;
                        (vec![], number(s, args.get(5), 1)?)
                    }
                };

                Ok(Command::Modify {
                    kind,
                    return_original,
                    db: args[0].to_string(),
                    table: args[1].to_string(),
                    op: args[2].to_string(),
                    fields: list(args[3]),
                    values: list(args[4]),
                    modify_values,
                    limit,
                })
            }
        }
    }
}

/// Renders rows one per line as tab separated `field=value` pairs.
pub fn format_rows(rows: &[NamedRow]) -> String {
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for (j, (field, value)) in row.iter().enumerate() {
            if j > 0 {
                out.push('\t');
            }
            out.push_str(&format!("{field}={}", value.as_deref().unwrap_or("NULL")));
        }
    }
    out
}

impl Command {
    /// Runs the command and returns the text to print, if any.
    ///
    /// [`Command::Exit`] is left to the caller.
    pub fn execute(self, hs: &mut Manager) -> Result<Option<String>, CommandError> {
        match self {
            Command::Exit => Ok(None),
            Command::Purge => {
                hs.purge();
                Ok(None)
            }
            Command::Get {
                db,
                table,
                fields,
                value,
            } => {
                let row = hs.get(&db, &table, &refs(&fields), &value)?;
                Ok(Some(match row {
                    Some(row) => format_rows(&[row]),
                    None => "no rows".to_string(),
                }))
            }
            Command::Find {
                db,
                table,
                op,
                fields,
                values,
                limit,
                offset,
            } => {
                let opts = QueryOptions {
                    limit,
                    offset,
                    ..Default::default()
                };
                let rows = hs.find(&db, &table, &op, &refs(&fields), &refs(&values), &opts)?;
                if rows.is_empty() {
                    return Ok(Some("no rows".to_string()));
                }
                Ok(Some(format_rows(&rows)))
            }
            Command::Insert {
                db,
                table,
                fields,
                values,
            } => {
                let pairs = fields
                    .iter()
                    .zip(values.iter())
                    .map(|(f, v)| (f.as_str(), v.as_str()))
                    .collect::<Vec<(&str, &str)>>();
                hs.insert(&db, &table, &pairs, None)?;
                Ok(Some("inserted".to_string()))
            }
            Command::Modify {
                kind,
                return_original,
                db,
                table,
                op,
                fields,
                values,
                modify_values,
                limit,
            } => {
                let opts = QueryOptions {
                    limit,
                    return_original,
                    ..Default::default()
                };
                let res = hs.modify(
                    kind,
                    &db,
                    &table,
                    &op,
                    &refs(&fields),
                    &refs(&values),
                    &refs(&modify_values),
                    &opts,
                )?;
                Ok(Some(match res {
                    Modified::Count(n) => format!("{n} rows affected"),
                    Modified::Rows(rows) if rows.is_empty() => "no rows".to_string(),
                    Modified::Rows(rows) => format_rows(&rows),
                }))
            }
        }
    }
}
