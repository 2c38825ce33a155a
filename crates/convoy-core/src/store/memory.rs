//! In-memory store implementation
//!
//! Holds every collection behind a single lock so a transaction's assertions
//! and updates are evaluated against one consistent snapshot.

use super::{Document, Op, Store, StoreError, StoreResult, Update};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

type Collection = BTreeMap<String, Document>;

/// In-memory transactional store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the backend connection
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.len())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn aborted(op: &Op) -> StoreError {
        StoreError::Aborted {
            collection: op.collection.clone(),
            id: op.id.clone(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn run(&self, ops: Vec<Op>) -> StoreResult<()> {
        self.check_available()?;
        let mut collections = self.collections.write();

        // Every assertion is checked before anything is written.
        for op in &ops {
            let current = collections
                .get(&op.collection)
                .and_then(|c| c.get(&op.id));
            let update_ok = match op.update {
                Update::Insert(_) => current.is_none(),
                Update::Set(_) => current.is_some(),
                Update::None | Update::Upsert(_) | Update::Remove => true,
            };
            if !update_ok || !op.assert.holds(current) {
                debug!("Transaction aborted on {}", op);
                return Err(Self::aborted(op));
            }
        }

        for op in ops {
            let collection = collections.entry(op.collection.clone()).or_default();
            match op.update {
                Update::None => {}
                Update::Insert(doc) => {
                    collection.insert(op.id.clone(), doc);
                }
                Update::Set(fields) | Update::Upsert(fields) => {
                    let doc = collection.entry(op.id.clone()).or_default();
                    for (key, value) in fields {
                        doc.insert(key, value);
                    }
                }
                Update::Remove => {
                    collection.remove(&op.id);
                }
            }
            trace!("Applied op on {}/{}", op.collection, op.id);
        }
        Ok(())
    }

    async fn find(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn find_all(&self, collection: &str) -> StoreResult<Vec<(String, Document)>> {
        self.check_available()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default())
    }
}
