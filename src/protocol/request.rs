use std::{fmt, str::FromStr};

use crate::error::{HsError, Result};

use super::codec::{Value, encode};

/// Identifier the client assigns to an opened index.
pub type IndexId = usize;

const OPEN_INDEX: &str = "P";
const INSERT: &str = "+";

/// Comparison applied to the index columns of a find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl FindOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindOp::Eq => "=",
            FindOp::Gt => ">",
            FindOp::Ge => ">=",
            FindOp::Lt => "<",
            FindOp::Le => "<=",
        }
    }
}

impl FromStr for FindOp {
    type Err = HsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(FindOp::Eq),
            ">" => Ok(FindOp::Gt),
            ">=" => Ok(FindOp::Ge),
            "<" => Ok(FindOp::Lt),
            "<=" => Ok(FindOp::Le),
            op => Err(HsError::Validation(format!(
                "comparison operation '{op}' is not supported"
            ))),
        }
    }
}

impl fmt::Display for FindOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyKind {
    Update,
    Delete,
    Increment,
    Decrement,
}

/// Modification applied to the rows a find matched.
///
/// With `return_original` the server answers with the rows as they were before
/// the change instead of an affected-row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyOp {
    pub kind: ModifyKind,
    pub return_original: bool,
}

impl ModifyOp {
    pub fn new(kind: ModifyKind, return_original: bool) -> Self {
        Self {
            kind,
            return_original,
        }
    }

    /// Everything but a delete substitutes values into the matched rows.
    pub fn requires_values(&self) -> bool {
        self.kind != ModifyKind::Delete
    }
}

impl FromStr for ModifyOp {
    type Err = HsError;

    fn from_str(s: &str) -> Result<Self> {
        let (op, return_original) = match s.strip_suffix('?') {
            Some(op) => (op, true),
            None => (s, false),
        };
        let kind = match op {
            "U" => ModifyKind::Update,
            "D" => ModifyKind::Delete,
            "+" => ModifyKind::Increment,
            "-" => ModifyKind::Decrement,
            _ => {
                return Err(HsError::Validation(format!(
                    "modify operation '{s}' is not supported"
                )));
            }
        };
        Ok(Self::new(kind, return_original))
    }
}

impl fmt::Display for ModifyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.kind {
            ModifyKind::Update => "U",
            ModifyKind::Delete => "D",
            ModifyKind::Increment => "+",
            ModifyKind::Decrement => "-",
        };
        f.write_str(op)?;
        if self.return_original {
            f.write_str("?")?;
        }
        Ok(())
    }
}

pub(crate) fn check_columns<T>(columns: &[T], what: &str) -> Result<()> {
    if columns.is_empty() {
        return Err(HsError::Validation(format!("{what} must be a non-empty list")));
    }
    Ok(())
}

fn text(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

fn encode_all(columns: &[Value<'_>]) -> Vec<Vec<u8>> {
    columns.iter().map(|c| encode(*c)).collect()
}

/// A single protocol request, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    OpenIndex {
        id: IndexId,
        db: &'a str,
        table: &'a str,
        index_name: &'a str,
        fields: &'a [&'a str],
    },
    Find {
        id: IndexId,
        op: FindOp,
        columns: &'a [Value<'a>],
        limit: usize,
        offset: usize,
    },
    FindModify {
        id: IndexId,
        op: FindOp,
        columns: &'a [Value<'a>],
        limit: usize,
        offset: usize,
        modify: ModifyOp,
        modify_columns: &'a [Value<'a>],
    },
    Insert {
        id: IndexId,
        columns: &'a [Value<'a>],
    },
}

impl<'a> Request<'a> {
    pub fn open_index(
        id: IndexId,
        db: &'a str,
        table: &'a str,
        index_name: &'a str,
        fields: &'a [&'a str],
    ) -> Result<Self> {
        check_columns(fields, "fields")?;
        Ok(Request::OpenIndex {
            id,
            db,
            table,
            index_name,
            fields,
        })
    }

    pub fn find(
        id: IndexId,
        op: FindOp,
        columns: &'a [Value<'a>],
        limit: usize,
        offset: usize,
    ) -> Result<Self> {
        check_columns(columns, "columns")?;
        Ok(Request::Find {
            id,
            op,
            columns,
            limit,
            offset,
        })
    }

    pub fn find_modify(
        id: IndexId,
        op: FindOp,
        columns: &'a [Value<'a>],
        limit: usize,
        offset: usize,
        modify: ModifyOp,
        modify_columns: &'a [Value<'a>],
    ) -> Result<Self> {
        check_columns(columns, "columns")?;
        if modify.requires_values() {
            check_columns(modify_columns, "modify columns")?;
        }
        Ok(Request::FindModify {
            id,
            op,
            columns,
            limit,
            offset,
            modify,
            modify_columns,
        })
    }

    pub fn insert(id: IndexId, columns: &'a [Value<'a>]) -> Result<Self> {
        check_columns(columns, "columns")?;
        Ok(Request::Insert { id, columns })
    }

    /// Wire tokens, values already escaped.
    pub fn tokens(&self) -> Vec<Vec<u8>> {
        match self {
            Request::OpenIndex {
                id,
                db,
                table,
                index_name,
                fields,
            } => {
                let fields = fields.join(",");
                vec![
                    text(OPEN_INDEX),
                    text(&id.to_string()),
                    encode(Some(db.as_bytes())),
                    encode(Some(table.as_bytes())),
                    encode(Some(index_name.as_bytes())),
                    encode(Some(fields.as_bytes())),
                ]
            }
            Request::Find {
                id,
                op,
                columns,
                limit,
                offset,
            } => {
                let mut tokens = vec![
                    text(&id.to_string()),
                    text(op.as_str()),
                    text(&columns.len().to_string()),
                ];
                tokens.extend(encode_all(columns));
                tokens.push(text(&limit.to_string()));
                tokens.push(text(&offset.to_string()));
                tokens
            }
            Request::FindModify {
                id,
                op,
                columns,
                limit,
                offset,
                modify,
                modify_columns,
            } => {
                let mut tokens = Request::Find {
                    id: *id,
                    op: *op,
                    columns: *columns,
                    limit: *limit,
                    offset: *offset,
                }
                .tokens();
                tokens.push(text(&modify.to_string()));
                tokens.extend(encode_all(modify_columns));
                tokens
            }
            Request::Insert { id, columns } => {
                let mut tokens = vec![
                    text(&id.to_string()),
                    text(INSERT),
                    text(&columns.len().to_string()),
                ];
                tokens.extend(encode_all(columns));
                tokens
            }
        }
    }
}
