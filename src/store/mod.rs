//! Storage-facing accessors over an abstract document store.

mod cached;
mod committed;
mod document;
mod memory;
mod revision;

pub use cached::CachedViewStore;
pub use committed::CommittedStore;
pub use document::{Collection, DocKey, DocumentStore, StoreExt, Txn, TxnExt};
pub use memory::MemoryStore;
pub use revision::RevisionStore;

pub(crate) mod txn {
    //! Transaction-scoped writers used by the commit path.
    pub(crate) use super::cached::{
        clear_game, prune_above, read_stack, write_snapshot, write_stack,
    };
    pub(crate) use super::committed::{read as read_canonical, write as write_canonical, write_views};
    pub(crate) use super::revision::{prune_after, read as read_revision, write as write_revision};
}
