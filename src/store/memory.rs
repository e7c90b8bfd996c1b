//! In-process document store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};

use crate::EngineError;
use crate::store::{Collection, DocKey, DocumentStore, Txn};

type Docs = BTreeMap<DocKey, String>;

/// Document store held in memory.
///
/// Transactions run against a private copy of the documents and swap it in
/// only when the closure succeeds, so a failed transaction leaves nothing
/// behind. Transactions are serialized by a single lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Docs>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        debug!("Creating MemoryStore");
        Self::default()
    }

    /// Number of stored documents in `collection`.
    pub fn count(&self, collection: Collection) -> Result<usize, EngineError> {
        Ok(self.scan(collection, "")?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Docs>, EngineError> {
        self.docs
            .lock()
            .map_err(|_| EngineError::internal("memory store lock poisoned"))
    }
}

fn scan_docs(docs: &Docs, collection: Collection, prefix: &str) -> Vec<(DocKey, String)> {
    docs.range(DocKey::new(collection, prefix)..)
        .take_while(|(key, _)| key.collection() == collection && key.key().starts_with(prefix))
        .map(|(key, body)| (key.clone(), body.clone()))
        .collect()
}

struct MemoryTxn<'a> {
    docs: &'a mut Docs,
}

impl Txn for MemoryTxn<'_> {
    fn get(&mut self, key: &DocKey) -> Result<Option<String>, EngineError> {
        Ok(self.docs.get(key).cloned())
    }

    fn put(&mut self, key: &DocKey, body: String) -> Result<(), EngineError> {
        self.docs.insert(key.clone(), body);
        Ok(())
    }

    fn delete(&mut self, key: &DocKey) -> Result<bool, EngineError> {
        Ok(self.docs.remove(key).is_some())
    }

    fn scan(
        &mut self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        Ok(scan_docs(self.docs, collection, prefix))
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &DocKey) -> Result<Option<String>, EngineError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn scan(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        let docs = self.lock()?;
        Ok(scan_docs(&docs, collection, prefix))
    }

    fn transact<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn Txn) -> Result<T, EngineError>,
    {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let value = f(&mut MemoryTxn { docs: &mut working })?;
        *guard = working;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameId, Uid};

    #[test]
    fn test_failed_transaction_applies_nothing() {
        let store = MemoryStore::new();
        let key = DocKey::game(GameId(1));
        let result: Result<(), EngineError> = store.transact(|txn| {
            txn.put(&key, "{}".to_string())?;
            Err(EngineError::transient("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn test_scan_is_scoped_to_collection_and_prefix() {
        let store = MemoryStore::new();
        store
            .transact(|txn| {
                txn.put(&DocKey::stack(GameId(1), Uid(1)), "a".into())?;
                txn.put(&DocKey::stack(GameId(1), Uid(2)), "b".into())?;
                txn.put(&DocKey::stack(GameId(2), Uid(1)), "c".into())?;
                txn.put(&DocKey::view(GameId(1), Uid(1)), "d".into())
            })
            .unwrap();

        let found = store.scan(Collection::Stacks, "1/").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.count(Collection::Views).unwrap(), 1);
    }
}
