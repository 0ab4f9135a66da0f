//! High-level client.
//!
//! [`Manager`] pairs a read pool with a write pool and names every operation by
//! what it does. Indexes are opened on demand and cached, results come back with
//! their field names attached, and a recoverable connection loss is retried once
//! through [`retry_on_failure`].
//!
//! # Example
//! ```rust,no_run
//! use hsclient::{Manager, ManagerConfig, QueryOptions};
//!
//! let mut hs = Manager::new(&ManagerConfig::default()).unwrap();
//!
//! hs.insert("db", "users", &[("id", "1"), ("name", "alice")], None).unwrap();
//! let row = hs.get("db", "users", &["id", "name"], "1").unwrap();
//! let rows = hs
//!     .find("db", "users", ">=", &["id", "name"], &["1"], &QueryOptions::limit(10))
//!     .unwrap();
//! ```
use crate::{
    config::ManagerConfig,
    error::Result,
    protocol::{FindOp, ModifyKind, ModifyOp, Row, check_columns, codec::Value},
    retry::retry_on_failure,
    socket::{ModifyResult, ReadSocket, WriteSocket},
};

/// A result row as `(field, value)` pairs; `None` is SQL `NULL`.
pub type NamedRow = Vec<(String, Option<String>)>;

const DEFAULT_STEPS: &[&str] = &["1"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Index to open, `PRIMARY` when unset.
    pub index_name: Option<String>,
    pub limit: usize,
    pub offset: usize,
    /// Return the rows as they were before a modification instead of a count.
    pub return_original: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            index_name: None,
            limit: 1,
            offset: 0,
            return_original: false,
        }
    }
}

impl QueryOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

/// Outcome of update, incr, decr and delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modified {
    Count(u64),
    Rows(Vec<NamedRow>),
}

#[derive(Debug)]
pub struct Manager {
    read: ReadSocket,
    write: WriteSocket,
}

fn to_values<'a>(values: &'a [&'a str]) -> Vec<Value<'a>> {
    values.iter().map(|v| Some(v.as_bytes())).collect()
}

fn named(fields: &[&str], rows: Vec<Row>) -> Vec<NamedRow> {
    rows.into_iter()
        .map(|row| {
            fields
                .iter()
                .zip(row)
                .map(|(field, value)| {
                    let value = value.map(|v| String::from_utf8_lossy(&v).into_owned());
                    (field.to_string(), value)
                })
                .collect()
        })
        .collect()
}

impl Manager {
    pub fn new(config: &ManagerConfig) -> Result<Self> {
        let (read, write) = config.servers()?;
        Ok(Self {
            read: ReadSocket::new(read, &config.pool)?,
            write: WriteSocket::new(write, &config.pool)?,
        })
    }

    pub fn read_socket(&mut self) -> &mut ReadSocket {
        &mut self.read
    }

    pub fn write_socket(&mut self) -> &mut WriteSocket {
        &mut self.write
    }

    /// Single-row lookup of `value` on the first of `fields`.
    pub fn get(
        &mut self,
        db: &str,
        table: &str,
        fields: &[&str],
        value: &str,
    ) -> Result<Option<NamedRow>> {
        let rows = self.find(db, table, "=", fields, &[value], &QueryOptions::default())?;
        Ok(rows.into_iter().next())
    }

    pub fn find(
        &mut self,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        opts: &QueryOptions,
    ) -> Result<Vec<NamedRow>> {
        let op: FindOp = op.parse()?;
        check_columns(values, "values")?;
        check_columns(fields, "fields")?;
        let columns = to_values(values);

        let rows = retry_on_failure(|| {
            let id = self
                .read
                .get_index_id(db, table, fields, opts.index_name.as_deref())?;
            self.read.find(id, op, &columns, opts.limit, opts.offset)
        })?;
        Ok(named(fields, rows))
    }

    /// Inserts one row given as `(field, value)` pairs.
    pub fn insert(
        &mut self,
        db: &str,
        table: &str,
        pairs: &[(&str, &str)],
        index_name: Option<&str>,
    ) -> Result<()> {
        check_columns(pairs, "fields")?;
        let (fields, values): (Vec<&str>, Vec<&str>) = pairs.iter().copied().unzip();
        let columns = to_values(&values);

        retry_on_failure(|| {
            let id = self.write.get_index_id(db, table, &fields, index_name)?;
            self.write.insert(id, &columns)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        update_values: &[&str],
        opts: &QueryOptions,
    ) -> Result<Modified> {
        self.modify(
            ModifyKind::Update,
            db,
            table,
            op,
            fields,
            values,
            update_values,
            opts,
        )
    }

    /// Increments the matched rows by `steps`, one step per field; `["1"]` when
    /// empty.
    #[allow(clippy::too_many_arguments)]
    pub fn incr(
        &mut self,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        steps: &[&str],
        opts: &QueryOptions,
    ) -> Result<Modified> {
        let steps = if steps.is_empty() { DEFAULT_STEPS } else { steps };
        self.modify(
            ModifyKind::Increment,
            db,
            table,
            op,
            fields,
            values,
            steps,
            opts,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn decr(
        &mut self,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        steps: &[&str],
        opts: &QueryOptions,
    ) -> Result<Modified> {
        let steps = if steps.is_empty() { DEFAULT_STEPS } else { steps };
        self.modify(
            ModifyKind::Decrement,
            db,
            table,
            op,
            fields,
            values,
            steps,
            opts,
        )
    }

    pub fn delete(
        &mut self,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        opts: &QueryOptions,
    ) -> Result<Modified> {
        self.modify(ModifyKind::Delete, db, table, op, fields, values, &[], opts)
    }

    /// Shared body of the modifying operations.
    #[allow(clippy::too_many_arguments)]
    pub fn modify(
        &mut self,
        kind: ModifyKind,
        db: &str,
        table: &str,
        op: &str,
        fields: &[&str],
        values: &[&str],
        modify_values: &[&str],
        opts: &QueryOptions,
    ) -> Result<Modified> {
        let op: FindOp = op.parse()?;
        let modify = ModifyOp::new(kind, opts.return_original);
        check_columns(values, "values")?;
        check_columns(fields, "fields")?;
        if modify.requires_values() {
            check_columns(modify_values, "modify values")?;
        }
        let columns = to_values(values);
        let modify_columns = to_values(modify_values);

        let res = retry_on_failure(|| {
            let id = self
                .write
                .get_index_id(db, table, fields, opts.index_name.as_deref())?;
            self.write.find_modify(
                id,
                op,
                &columns,
                modify,
                &modify_columns,
                opts.limit,
                opts.offset,
            )
        })?;

        match res {
            ModifyResult::Affected(count) => Ok(Modified::Count(count)),
            ModifyResult::Original(rows) => Ok(Modified::Rows(named(fields, rows))),
        }
    }

    /// Disconnects both pools and forgets every opened index.
    pub fn purge(&mut self) {
        self.read.purge();
        self.write.purge();
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use crate::{
        config::{PoolConfig, ServerEndpoint},
        error::HsError,
    };

    use super::*;

    fn manager() -> Manager {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = ServerEndpoint::inet("127.0.0.1", listener.local_addr().unwrap().port());
        Manager::new(&ManagerConfig {
            read_servers: vec![endpoint.clone()],
            write_servers: vec![endpoint],
            pool: PoolConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn named_rows_zip_fields() {
        let rows = vec![vec![Some(b"1".to_vec()), None]];
        assert_eq!(
            named(&["id", "name"], rows),
            vec![vec![("id".to_string(), Some("1".to_string())), ("name".to_string(), None)]]
        );
    }

    #[test]
    fn default_options_read_one_row() {
        let opts = QueryOptions::default();
        assert_eq!(opts.limit, 1);
        assert_eq!(opts.offset, 0);
        assert_eq!(QueryOptions::limit(5).limit, 5);
    }

    #[test]
    fn validation_never_reaches_the_server() {
        let mut hs = manager();
        let opts = QueryOptions::default();

        let inputs = vec![
            hs.find("db", "t", "!=", &["id"], &["1"], &opts).unwrap_err(),
            hs.find("db", "t", "=", &["id"], &[], &opts).unwrap_err(),
            hs.update("db", "t", "=", &["id"], &["1"], &[], &opts)
                .unwrap_err(),
            hs.insert("db", "t", &[], None).unwrap_err(),
        ];

        for err in inputs {
            assert!(matches!(err, HsError::Validation(_)), "{err:?}");
        }
        assert_eq!(hs.read_socket().index_count(), 0);
    }
}
