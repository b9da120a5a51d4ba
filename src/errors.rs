use crate::relation::locator::RelationLocatorBackend;

/// Faults raised when the storage manager is used in a way that breaks one of
/// its invariants. None of them are recoverable by retrying the operation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// Unpin was called on a handle that has no pins.
    #[error("relation {0} is not pinned")]
    NotPinned(RelationLocatorBackend),

    /// The handle refers to a relation that was already destroyed.
    #[error("smgr relation handle is no longer valid")]
    StaleHandle,

    /// The registry map and the handle arena disagree.
    #[error("smgr relation hashtable corrupted")]
    RegistryCorrupted,

    /// An operation that hands out raw descriptors was called while
    /// interrupts could be processed.
    #[error("{0} must be called with interrupts held")]
    InterruptsNotHeld(&'static str),

    /// The relation locator can not name a relation file.
    #[error("invalid relation locator {0:?}")]
    InvalidLocator(RelationLocatorBackend),

    /// Truncate needs one old and one new size per fork.
    #[error("truncate of {forks} forks got {old_nblocks} old sizes and {nblocks} new sizes")]
    TruncateSizesMismatch {
        forks: usize,
        old_nblocks: usize,
        nblocks: usize,
    },

    /// The selected backend does not implement the requested capability.
    #[error("storage backend {0} does not support {1}")]
    Unsupported(&'static str, &'static str),
}
