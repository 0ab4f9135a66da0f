use std::{collections::HashMap, fmt};

use crate::protocol::IndexId;

/// Identity of an opened index. Field order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct IndexKey {
    db: String,
    table: String,
    index_name: String,
    fields: Vec<String>,
}

impl IndexKey {
    pub fn new(db: &str, table: &str, index_name: &str, fields: &[&str]) -> Self {
        Self {
            db: db.to_string(),
            table: table.to_string(),
            index_name: index_name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.db,
            self.table,
            self.index_name,
            self.fields.join(",")
        )
    }
}

/// Opened indexes and the pool slot of the connection that owns each of them.
///
/// Both maps are updated together: an id is either in the key cache and the
/// owner map, or in neither.
#[derive(Debug, Default)]
pub(crate) struct IndexRegistry {
    ids: HashMap<IndexKey, IndexId>,
    owners: HashMap<IndexId, usize>,
    next_id: IndexId,
}

impl IndexRegistry {
    pub fn lookup(&self, key: &IndexKey) -> Option<IndexId> {
        self.ids.get(key).copied()
    }

    pub fn owner(&self, id: IndexId) -> Option<usize> {
        self.owners.get(&id).copied()
    }

    /// Id the next opened index will receive.
    pub fn next_id(&self) -> IndexId {
        self.next_id
    }

    pub fn register(&mut self, key: IndexKey, id: IndexId, owner: usize) {
        self.owners.insert(id, owner);
        self.ids.insert(key, id);
        self.next_id = self.next_id.max(id + 1);
    }

    pub fn purge(&mut self, id: IndexId) {
        self.owners.remove(&id);
        self.ids.retain(|_, v| *v != id);
    }

    /// Ids owned by the connection in `slot`.
    pub fn owned_by(&self, slot: usize) -> Vec<IndexId> {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == slot)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn owner_slots(&self) -> Vec<usize> {
        let mut slots = self.owners.values().copied().collect::<Vec<usize>>();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.owners.clear();
        self.next_id = 0;
    }
}
