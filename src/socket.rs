//! Request builders on top of a [`ConnectionPool`].
//!
//! [`ReadSocket`] and [`WriteSocket`] are the two roles a pool plays: reads go to
//! the servers' read port, modifications to the write port. Both dereference to
//! their pool for index management.
//!
//! Every builder validates its input before touching the network and requires
//! the index id to be registered with the pool.
use std::ops::{Deref, DerefMut};

use crate::{
    config::{PoolConfig, ServerEndpoint},
    error::{HsError, Result},
    pool::ConnectionPool,
    protocol::{FindOp, IndexId, ModifyOp, Request, Row, codec::Value},
};

/// Outcome of a find-modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyResult {
    /// Number of rows affected.
    Affected(u64),
    /// Rows as they were before the modification (`?` operations).
    Original(Vec<Row>),
}

fn find(
    pool: &mut ConnectionPool,
    index_id: IndexId,
    op: FindOp,
    columns: &[Value<'_>],
    limit: usize,
    offset: usize,
) -> Result<Vec<Row>> {
    let request = Request::find(index_id, op, columns, limit, offset)?;
    let response = pool.execute(index_id, &request.tokens(), true)?;
    Ok(response.rows)
}

#[derive(Debug)]
pub struct ReadSocket {
    pool: ConnectionPool,
}

impl ReadSocket {
    pub fn new(servers: Vec<ServerEndpoint>, config: &PoolConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(servers, config)?,
        })
    }

    /// Finds rows through an opened index.
    ///
    /// `columns` are compared against the index columns in index order. Only
    /// `limit` rows are returned, so multi-row lookups need an explicit limit.
    pub fn find(
        &mut self,
        index_id: IndexId,
        op: FindOp,
        columns: &[Value<'_>],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Row>> {
        find(&mut self.pool, index_id, op, columns, limit, offset)
    }
}

#[derive(Debug)]
pub struct WriteSocket {
    pool: ConnectionPool,
}

impl WriteSocket {
    pub fn new(servers: Vec<ServerEndpoint>, config: &PoolConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(servers, config)?,
        })
    }

    /// Reads through the write pool, e.g. to observe a row right after changing it.
    pub fn find(
        &mut self,
        index_id: IndexId,
        op: FindOp,
        columns: &[Value<'_>],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Row>> {
        find(&mut self.pool, index_id, op, columns, limit, offset)
    }

    /// Updates, deletes, increments or decrements the rows matched by
    /// `op`/`columns`.
    ///
    /// `modify_columns` holds the new values (or steps) in index order; a delete
    /// needs none.
    #[allow(clippy::too_many_arguments)]
    pub fn find_modify(
        &mut self,
        index_id: IndexId,
        op: FindOp,
        columns: &[Value<'_>],
        modify: ModifyOp,
        modify_columns: &[Value<'_>],
        limit: usize,
        offset: usize,
    ) -> Result<ModifyResult> {
        let request =
            Request::find_modify(index_id, op, columns, limit, offset, modify, modify_columns)?;
        let response = self.pool.execute(index_id, &request.tokens(), true)?;

        if modify.return_original {
            return Ok(ModifyResult::Original(response.rows));
        }

        let count = response
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|field| field.as_deref())
            .and_then(|field| std::str::from_utf8(field).ok())
            .and_then(|field| field.parse::<u64>().ok())
            .ok_or_else(|| HsError::Protocol("missing affected row count".into()))?;
        Ok(ModifyResult::Affected(count))
    }

    /// Inserts one row; `columns` follow the order of the index fields.
    pub fn insert(&mut self, index_id: IndexId, columns: &[Value<'_>]) -> Result<()> {
        let request = Request::insert(index_id, columns)?;
        self.pool.execute(index_id, &request.tokens(), true)?;
        Ok(())
    }
}

impl Deref for ReadSocket {
    type Target = ConnectionPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

impl DerefMut for ReadSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pool
    }
}

impl Deref for WriteSocket {
    type Target = ConnectionPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

impl DerefMut for WriteSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pool
    }
}
