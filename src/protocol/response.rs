use crate::error::{HsError, Result};

use super::{TOKEN_SEPARATOR, codec::decode};

/// One decoded result row; `None` columns are SQL `NULL`.
pub type Row = Vec<Option<Vec<u8>>>;

const UNKNOWN_ERROR: &str = "Unknown remote error";

/// Successful server reply, already split into rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub columns: usize,
    pub rows: Vec<Row>,
}

impl Response {
    /// Parses a response line (without its trailing line feed).
    ///
    /// A non-zero status becomes [`HsError::Operational`] carrying the server's
    /// message. Trailing tokens that do not fill a whole row are rejected.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let tokens = line.split(|b| *b == TOKEN_SEPARATOR).collect::<Vec<&[u8]>>();

        let status = parse_number(tokens[0], "status")?;
        if status != 0 {
            let error = tokens
                .get(2)
                .map(|t| String::from_utf8_lossy(t).into_owned())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            return Err(HsError::Operational(format!(
                "HandlerSocket returned an error code: {error}"
            )));
        }

        let columns = match tokens.get(1) {
            Some(t) => parse_number(t, "column count")?,
            None => return Err(HsError::Protocol("missing column count".into())),
        };

        let fields = &tokens[2..];
        if columns == 0 {
            if fields.is_empty() {
                return Ok(Self {
                    columns,
                    rows: vec![],
                });
            }
            return Err(HsError::Protocol(format!(
                "{} fields returned for zero columns",
                fields.len()
            )));
        }
        if fields.len() % columns != 0 {
            return Err(HsError::Protocol(format!(
                "{} fields do not divide into rows of {columns} columns",
                fields.len()
            )));
        }

        let rows = fields
            .chunks(columns)
            .map(|row| row.iter().map(|t| decode(t)).collect())
            .collect();

        Ok(Self { columns, rows })
    }
}

fn parse_number(token: &[u8], what: &str) -> Result<usize> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            HsError::Protocol(format!(
                "invalid {what} '{}'",
                String::from_utf8_lossy(token)
            ))
        })
}
