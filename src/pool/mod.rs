//! Connection pool with index affinity.
//!
//! An index opened on a server is only valid on the connection that opened it,
//! so the pool remembers which connection owns every index id and routes every
//! later request on that id to the same connection. Connections for fresh work
//! are picked in random order to spread load across the servers.
//!
//! A pool is not meant to be shared: its caches are mutated without
//! synchronisation and the server-side index handles belong to its sockets.
//! Run one pool per worker instead.
//!
//! # Failure handling
//!
//! - A connection that fails enters backoff and is skipped until it expires.
//! - When the owner of an index fails, every index it owned is forgotten. If the
//!   pool has other connections the caller gets a
//!   [`HsError::RecoverableConnection`] and may retry the whole operation, which
//!   then reopens the index elsewhere.
//! - When nothing is reachable the caller gets a terminal
//!   [`HsError::Connection`].
mod registry;

use log::{debug, trace, warn};
use rand::seq::SliceRandom;

use crate::{
    config::{PoolConfig, ServerEndpoint},
    connection::Connection,
    error::{HsError, Result},
    protocol::{IndexId, Request, Response, codec::build_frame},
};

use registry::{IndexKey, IndexRegistry};

pub const DEFAULT_INDEX_NAME: &str = "PRIMARY";

#[derive(Debug)]
pub struct ConnectionPool {
    connections: Vec<Connection>,
    registry: IndexRegistry,
    retry_limit: usize,
}

impl ConnectionPool {
    pub fn new(servers: Vec<ServerEndpoint>, config: &PoolConfig) -> Result<Self> {
        if servers.is_empty() {
            return Err(HsError::Validation(
                "a pool needs at least one server".into(),
            ));
        }

        let connections = servers
            .into_iter()
            .map(|endpoint| Connection::new(endpoint, config))
            .collect();

        Ok(Self {
            connections,
            registry: IndexRegistry::default(),
            retry_limit: config.retry_limit,
        })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Server of the connection that owns `id`, if the id is registered.
    pub fn index_endpoint(&self, id: IndexId) -> Option<&ServerEndpoint> {
        self.registry
            .owner(id)
            .map(|slot| self.connections[slot].endpoint())
    }

    /// Number of registered indexes.
    pub fn index_count(&self) -> usize {
        self.registry.len()
    }

    /// Picks a connected pool slot for work on `index_id`.
    ///
    /// A registered id always resolves to its owner. An unregistered id is an
    /// error when `require_affinity` is set; otherwise any reachable connection
    /// will do.
    pub fn resolve_connection(
        &mut self,
        index_id: Option<IndexId>,
        require_affinity: bool,
    ) -> Result<usize> {
        let owner = index_id.and_then(|id| self.registry.owner(id).map(|slot| (id, slot)));

        let candidates = match (owner, index_id) {
            (Some((_, slot)), _) => vec![slot],
            (None, Some(id)) if require_affinity => {
                return Err(HsError::Operational(format!(
                    "There is no connection with given index id \"{id}\""
                )));
            }
            _ => {
                let mut slots = (0..self.len()).collect::<Vec<usize>>();
                slots.shuffle(&mut rand::thread_rng());
                slots
            }
        };

        let mut last_error = None;
        for attempt in 0..self.retry_limit.max(candidates.len()) {
            let slot = candidates[attempt % candidates.len()];
            let conn = &mut self.connections[slot];

            let err = if conn.is_ready() {
                match conn.connect() {
                    Ok(()) => {
                        trace!("using {} for index {index_id:?}", conn.endpoint());
                        return Ok(slot);
                    }
                    Err(e) => e,
                }
            } else if owner.is_some() {
                // Owners stay connected while registered: a failed exchange
                // forgets their indexes before any backoff is armed.
                HsError::Connection(format!("{} is backing off", conn.endpoint()))
            } else {
                continue;
            };

            if let Some((id, slot)) = owner {
                return Err(self.lose_affinity(id, slot, err));
            }
            last_error = Some(err);
        }

        Err(Self::exhausted(last_error))
    }

    /// Returns the id of the index, opening it on a fresh connection if it is not
    /// cached yet. `index_name` defaults to [`DEFAULT_INDEX_NAME`].
    ///
    /// A failed open leaves the caches and the id counter untouched.
    pub fn get_index_id(
        &mut self,
        db: &str,
        table: &str,
        fields: &[&str],
        index_name: Option<&str>,
    ) -> Result<IndexId> {
        let index_name = index_name.unwrap_or(DEFAULT_INDEX_NAME);
        let key = IndexKey::new(db, table, index_name, fields);
        if let Some(id) = self.registry.lookup(&key) {
            return Ok(id);
        }

        let id = self.registry.next_id();
        let request = Request::open_index(id, db, table, index_name, fields)?;
        let slot = self.resolve_connection(None, false)?;
        self.exchange(slot, &request.tokens())?;

        debug!(
            "opened index {id} ({key}) on {}",
            self.connections[slot].endpoint()
        );
        self.registry.register(key, id, slot);
        Ok(id)
    }

    /// Sends `tokens` on the connection for `index_id` and parses the reply.
    ///
    /// A connection failure forgets the index first, so that a retry reopens it.
    pub fn execute<T: AsRef<[u8]>>(
        &mut self,
        index_id: IndexId,
        tokens: &[T],
        require_affinity: bool,
    ) -> Result<Response> {
        let slot = self.resolve_connection(Some(index_id), require_affinity)?;
        match self.exchange(slot, tokens) {
            Err(e) if e.is_connection() => {
                self.purge_index(index_id);
                Err(e)
            }
            res => res,
        }
    }

    /// Forgets a single index.
    pub fn purge_index(&mut self, id: IndexId) {
        self.registry.purge(id);
    }

    /// Disconnects every connection that owns an index and clears the caches.
    pub fn purge_indexes(&mut self) {
        for slot in self.registry.owner_slots() {
            self.connections[slot].disconnect();
        }
        self.registry.clear();
    }

    /// Disconnects every connection and clears the caches.
    pub fn purge(&mut self) {
        for conn in self.connections.iter_mut() {
            conn.disconnect();
        }
        self.registry.clear();
    }

    fn exchange<T: AsRef<[u8]>>(&mut self, slot: usize, tokens: &[T]) -> Result<Response> {
        let conn = &mut self.connections[slot];
        let res = conn
            .send(&build_frame(tokens))
            .and_then(|_| conn.readline());

        match res {
            Ok(line) => Response::parse(&line),
            Err(e) => {
                self.forget_connection(slot);
                Err(e)
            }
        }
    }

    fn lose_affinity(&mut self, id: IndexId, slot: usize, cause: HsError) -> HsError {
        warn!(
            "lost connection {} owning index {id}: {cause}",
            self.connections[slot].endpoint()
        );
        self.forget_connection(slot);

        if self.len() > 1 {
            HsError::RecoverableConnection(format!(
                "Could not use connection with given index id \"{id}\": {cause}"
            ))
        } else {
            Self::exhausted(Some(cause))
        }
    }

    /// The socket in `slot` is gone, and with it every index opened on it.
    fn forget_connection(&mut self, slot: usize) {
        for id in self.registry.owned_by(slot) {
            self.registry.purge(id);
        }
    }

    fn exhausted(cause: Option<HsError>) -> HsError {
        let cause = cause
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no server is ready".to_string());
        HsError::Connection(format!("Could not connect to any of given servers: {cause}"))
    }
}
