use std::{fmt, os::unix::io::RawFd};

use anyhow::Result;

use crate::{
    config::StorageMode,
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{aio::AioHandle, Block, BlockNumber},
};

use super::SMgrRelationData;

/// Identifies an entry of the storage manager dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmgrWhich {
    /// Relation forks stored as plain files on a file system.
    Md = 0,

    /// Relation forks stored on a process shared in-memory volume.
    Mem = 1,
}

/// Number of entries on the dispatch table.
pub const NSMGR: usize = 2;

impl SmgrWhich {
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            SmgrWhich::Md => "md",
            SmgrWhich::Mem => "mem",
        }
    }
}

impl fmt::Display for SmgrWhich {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability surface that every physical storage implementation provides.
///
/// Backends keep their own per relation state (open files, pending syncs)
/// keyed by the relation locator; the storage manager hands them the relation
/// handle data on every call and never inspects that state.
///
/// Every failure is reported through the returned error, except on
/// [unlink](SmgrBackend::unlink) which runs after the point of no return of a
/// transaction and can only report problems as warnings.
pub trait SmgrBackend {
    /// Called once when the storage manager is created.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when the storage manager is torn down.
    fn shutdown(&mut self) {}

    /// A new relation handle was created. No physical IO is expected here.
    fn open(&mut self, reln: &SMgrRelationData);

    /// Close the fork if it is open. Closing a fork that is not open is a no-op.
    fn close(&mut self, reln: &SMgrRelationData, fork: ForkNumber);

    fn create(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        is_redo: bool,
    ) -> Result<()>;

    fn exists(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        mode: StorageMode,
    ) -> Result<bool>;

    fn unlink(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber, is_redo: bool);

    fn extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        skip_fsync: bool,
    ) -> Result<()>;

    fn zero_extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
        skip_fsync: bool,
    ) -> Result<()>;

    /// Return false if the fork does not exist.
    fn prefetch(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<bool>;

    fn max_combine(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> u32;

    fn readv(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &mut [&mut Block],
    ) -> Result<()>;

    fn start_readv(
        &mut self,
        ioh: &mut AioHandle,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()>;

    fn writev(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &[&Block],
        skip_fsync: bool,
    ) -> Result<()>;

    fn writeback(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()>;

    fn nblocks(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<BlockNumber>;

    /// Cut the fork down to `nblocks` blocks. Return false when the fork is
    /// left with a different size, which recovery tolerates for a fork that
    /// is already shorter than `nblocks`.
    fn truncate(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        old_blocks: BlockNumber,
        nblocks: BlockNumber,
        mode: StorageMode,
    ) -> Result<bool>;

    fn immedsync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()>;

    fn registersync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()>;

    /// Flush every sync request registered so far. Called at checkpoints.
    fn sync_pending(&mut self) -> Result<()> {
        Ok(())
    }

    /// Return the descriptor and the byte offset of a block.
    fn fd(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> Result<(RawFd, u64)>;
}
