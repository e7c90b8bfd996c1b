//! Store wrappers shared by the integration suites.

#![allow(dead_code)]

use std::sync::Mutex;

use turnstack::MemoryStore;
use turnstack::store::{Collection, DocKey, DocumentStore, Txn};
use turnstack::EngineError;

/// Store wrapper whose transactions fail on any write to one collection.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on: Collection,
}

struct FailingTxn<'a> {
    inner: &'a mut dyn Txn,
    fail_on: Collection,
}

impl Txn for FailingTxn<'_> {
    fn get(&mut self, key: &DocKey) -> Result<Option<String>, EngineError> {
        self.inner.get(key)
    }

    fn put(&mut self, key: &DocKey, body: String) -> Result<(), EngineError> {
        if key.collection() == self.fail_on {
            return Err(EngineError::transient("injected write failure"));
        }
        self.inner.put(key, body)
    }

    fn delete(&mut self, key: &DocKey) -> Result<bool, EngineError> {
        self.inner.delete(key)
    }

    fn scan(
        &mut self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        self.inner.scan(collection, prefix)
    }
}

impl DocumentStore for FailingStore {
    fn get(&self, key: &DocKey) -> Result<Option<String>, EngineError> {
        self.inner.get(key)
    }

    fn scan(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        self.inner.scan(collection, prefix)
    }

    fn transact<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn Txn) -> Result<T, EngineError>,
    {
        let fail_on = self.fail_on;
        self.inner.transact(|txn| {
            let mut failing = FailingTxn {
                inner: txn,
                fail_on,
            };
            f(&mut failing)
        })
    }
}

type Interleaved = Box<dyn FnOnce(&MemoryStore) + Send>;

/// Store wrapper that runs one armed closure against the inner store just
/// before its next transaction, standing in for a request that commits
/// between another request's read and write.
#[derive(Default)]
pub struct RacingStore {
    pub inner: MemoryStore,
    armed: Mutex<Option<Interleaved>>,
}

impl RacingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
        }
    }

    /// Runs `f` before the next transaction.
    pub fn arm(&self, f: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.armed.lock().expect("Arm lock poisoned") = Some(Box::new(f));
    }
}

impl DocumentStore for RacingStore {
    fn get(&self, key: &DocKey) -> Result<Option<String>, EngineError> {
        self.inner.get(key)
    }

    fn scan(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError> {
        self.inner.scan(collection, prefix)
    }

    fn transact<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn Txn) -> Result<T, EngineError>,
    {
        let armed = self.armed.lock().expect("Arm lock poisoned").take();
        if let Some(interleaved) = armed {
            interleaved(&self.inner);
        }
        self.inner.transact(f)
    }
}
