use anyhow::Result;

use crate::{
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{smgr::StorageManager, BlockNumber, SMgrRelation},
};

/// Buffer cache operations that the storage manager relies on before it
/// changes relation files.
///
/// The buffer cache lives above the storage manager, so it is handed to the
/// bulk operations by the caller instead of being owned here.
pub trait BufferManager {
    /// Write out every dirty buffer of the given relations. Called before the
    /// relation files are synced, buffers are written through `smgr`.
    fn flush_relations_all_buffers(
        &mut self,
        smgr: &mut StorageManager,
        rels: &[SMgrRelation],
    ) -> Result<()>;

    /// Discard every buffer of the given relations without writing them.
    fn drop_relations_all_buffers(&mut self, rlocators: &[RelationLocatorBackend]);

    /// Discard the buffers of each fork at or after the matching entry of
    /// `first_blocks`, without writing them.
    fn drop_relation_buffers(
        &mut self,
        rlocator: RelationLocatorBackend,
        forks: &[ForkNumber],
        first_blocks: &[BlockNumber],
    );
}

/// Buffer manager of a worker that does not cache any block.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuffers;

impl BufferManager for NoBuffers {
    fn flush_relations_all_buffers(
        &mut self,
        _smgr: &mut StorageManager,
        _rels: &[SMgrRelation],
    ) -> Result<()> {
        Ok(())
    }

    fn drop_relations_all_buffers(&mut self, _rlocators: &[RelationLocatorBackend]) {}

    fn drop_relation_buffers(
        &mut self,
        _rlocator: RelationLocatorBackend,
        _forks: &[ForkNumber],
        _first_blocks: &[BlockNumber],
    ) {
    }
}
