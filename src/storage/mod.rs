use std::path::PathBuf;

use crate::relation::ForkNumber;

pub mod aio;
pub mod bufmgr;
pub mod inval;
pub mod md;
pub mod mem;
pub mod smgr;

pub use smgr::{SMgrRelation, StorageManager};

/// Blocks are numbered sequentially inside a fork, starting at 0.
pub type BlockNumber = u32;

/// A block number that can not exist on any fork.
///
/// Also used as the "unknown" value of cached fork sizes and of the
/// relation target block hint.
pub const INVALID_BLOCK_NUMBER: BlockNumber = BlockNumber::MAX;

/// The size of a block on a relation fork.
pub const BLOCK_SIZE: usize = 8192;

/// Each fork is divided into blocks (which may be thought of as the unit of IO).
///
/// The storage manager is the only piece of code that should be moving
/// blocks between memory and the backing storage.
pub type Block = [u8; BLOCK_SIZE];

/// Physical faults reported by the storage backends.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// The fork file does not exist.
    #[error("could not open file \"{}\": no such file", .0.display())]
    FileNotFound(PathBuf),

    /// Create was called on a fork that already exists.
    #[error("could not create file \"{}\": file exists", .0.display())]
    FileAlreadyExists(PathBuf),

    /// A block beyond the end of the fork was accessed.
    #[error("blocks {first}..{last} are beyond the end of fork {fork} with {nblocks} blocks")]
    BlockOutOfRange {
        fork: ForkNumber,
        first: BlockNumber,
        last: BlockNumber,
        nblocks: BlockNumber,
    },

    /// The fork can not grow past the maximum block number.
    #[error("cannot extend fork {0} beyond the maximum block number")]
    InvalidBlockNumber(ForkNumber),

    /// Truncate was asked to grow a fork.
    #[error("could not truncate fork {fork} to {nblocks} blocks: it's only {current} blocks now")]
    TruncateBeyondEnd {
        fork: ForkNumber,
        nblocks: BlockNumber,
        current: BlockNumber,
    },
}

/// Return the exclusive end of a block range, failing when the range does not
/// fit in the block number space.
pub(crate) fn block_range_end(
    fork: ForkNumber,
    blocknum: BlockNumber,
    nblocks: u32,
) -> Result<BlockNumber, Error> {
    blocknum
        .checked_add(nblocks)
        .ok_or(Error::InvalidBlockNumber(fork))
}
