//! Abstract transactional document store.

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display, EnumString};

use crate::{EngineError, GameId, Uid};

/// Document families persisted by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    /// Canonical state, keyed by game.
    Games,
    /// Immutable revision history, keyed by (game, revision).
    Revisions,
    /// Per-user masked views of canonical state, keyed by (game, user).
    Views,
    /// Speculative snapshots, keyed by (game, user, revision).
    Cache,
    /// Revision stacks, keyed by (game, user).
    Stacks,
    /// Elo records, keyed by user.
    Elo,
    /// Lifetime statistics, keyed by user.
    Ustats,
    /// Game-result log entries, keyed by (game, revision).
    Logs,
}

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocKey {
    collection: Collection,
    key: String,
}

/// Revisions are zero padded so lexical key order matches numeric order.
fn rev_key(rev: u64) -> String {
    format!("{:020}", rev)
}

impl DocKey {
    /// Builds a key from its raw parts.
    pub fn new(collection: Collection, key: impl Into<String>) -> Self {
        Self {
            collection,
            key: key.into(),
        }
    }

    /// Canonical state of `game`.
    pub fn game(game: GameId) -> Self {
        Self::new(Collection::Games, game.to_string())
    }

    /// History entry `rev` of `game`.
    pub fn revision(game: GameId, rev: u64) -> Self {
        Self::new(Collection::Revisions, format!("{}/{}", game, rev_key(rev)))
    }

    /// Masked view of `game` for `uid`.
    pub fn view(game: GameId, uid: Uid) -> Self {
        Self::new(Collection::Views, format!("{}/{}", game, uid))
    }

    /// Speculative snapshot `rev` of `game` for `uid`.
    pub fn cached(game: GameId, uid: Uid, rev: u64) -> Self {
        Self::new(
            Collection::Cache,
            format!("{}/{}/{}", game, uid, rev_key(rev)),
        )
    }

    /// Revision stack of `uid` in `game`.
    pub fn stack(game: GameId, uid: Uid) -> Self {
        Self::new(Collection::Stacks, format!("{}/{}", game, uid))
    }

    /// Elo record of `uid`.
    pub fn elo(uid: Uid) -> Self {
        Self::new(Collection::Elo, uid.to_string())
    }

    /// Lifetime statistics of `uid`.
    pub fn ustat(uid: Uid) -> Self {
        Self::new(Collection::Ustats, uid.to_string())
    }

    /// Result log entry written when `game` finalized at `rev`.
    pub fn log(game: GameId, rev: u64) -> Self {
        Self::new(Collection::Logs, format!("{}/{}", game, rev_key(rev)))
    }

    /// Prefix matching every per-game document of `game`.
    pub fn game_prefix(game: GameId) -> String {
        format!("{}/", game)
    }

    /// Prefix matching every snapshot of `uid` in `game`.
    pub fn user_prefix(game: GameId, uid: Uid) -> String {
        format!("{}/{}/", game, uid)
    }

    /// Document family.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Key within the family.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Trailing revision number of revision, cache and log keys.
    pub fn trailing_rev(&self) -> Option<u64> {
        self.key.rsplit('/').next().and_then(|s| s.parse().ok())
    }
}

/// Operations available inside one storage transaction.
pub trait Txn {
    /// Reads a document body.
    fn get(&mut self, key: &DocKey) -> Result<Option<String>, EngineError>;

    /// Creates or replaces a document body.
    fn put(&mut self, key: &DocKey, body: String) -> Result<(), EngineError>;

    /// Deletes a document. Returns whether it existed.
    fn delete(&mut self, key: &DocKey) -> Result<bool, EngineError>;

    /// Lists documents of `collection` whose key starts with `prefix`, in key order.
    fn scan(
        &mut self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError>;
}

/// A document service with single-document reads and atomic multi-document
/// transactions.
pub trait DocumentStore: Send + Sync {
    /// Reads a document body outside any transaction.
    fn get(&self, key: &DocKey) -> Result<Option<String>, EngineError>;

    /// Lists documents outside any transaction.
    fn scan(
        &self,
        collection: Collection,
        prefix: &str,
    ) -> Result<Vec<(DocKey, String)>, EngineError>;

    /// Runs `f` atomically. If `f` fails, none of its writes are applied.
    fn transact<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn Txn) -> Result<T, EngineError>;
}

/// Typed JSON access inside a transaction.
pub trait TxnExt: Txn {
    /// Reads and decodes a document.
    fn read<T: DeserializeOwned>(&mut self, key: &DocKey) -> Result<Option<T>, EngineError> {
        self.get(key)?
            .map(|body| serde_json::from_str(&body).map_err(EngineError::from))
            .transpose()
    }

    /// Encodes and writes a document.
    fn write<T: Serialize>(&mut self, key: &DocKey, value: &T) -> Result<(), EngineError> {
        let body = serde_json::to_string(value)?;
        self.put(key, body)
    }
}

impl<X: Txn + ?Sized> TxnExt for X {}

/// Typed JSON reads outside a transaction.
pub trait StoreExt: DocumentStore {
    /// Reads and decodes a document.
    fn load<T: DeserializeOwned>(&self, key: &DocKey) -> Result<Option<T>, EngineError> {
        self.get(key)?
            .map(|body| serde_json::from_str(&body).map_err(EngineError::from))
            .transpose()
    }
}

impl<S: DocumentStore + ?Sized> StoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_keys_sort_numerically() {
        let a = DocKey::revision(GameId(3), 9);
        let b = DocKey::revision(GameId(3), 10);
        assert!(a < b);
        assert_eq!(b.trailing_rev(), Some(10));
    }

    #[test]
    fn test_game_prefix_does_not_match_longer_ids() {
        let key = DocKey::view(GameId(11), Uid(2));
        assert!(!key.key().starts_with(&DocKey::game_prefix(GameId(1))));
        assert!(key.key().starts_with(&DocKey::game_prefix(GameId(11))));
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Ustats.to_string(), "ustats");
        assert_eq!(Collection::Games.as_ref(), "games");
    }
}
