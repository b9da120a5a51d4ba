use anyhow::{bail, Result};
use log::info;

use crate::{
    errors::Error,
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{bufmgr::BufferManager, BlockNumber, INVALID_BLOCK_NUMBER},
};

use super::{SMgrRelation, SmgrWhich, StorageManager};

impl StorageManager {
    /// Immediately sync all forks of the given relations to durable storage.
    ///
    /// All dirty buffers of the relations are written out through the buffer
    /// manager before any fork is synced, otherwise the sync could miss them.
    pub fn sync_all(
        &mut self,
        bufmgr: &mut dyn BufferManager,
        rels: &[SMgrRelation],
    ) -> Result<()> {
        if rels.is_empty() {
            return Ok(());
        }

        bufmgr.flush_relations_all_buffers(self, rels)?;

        let _hold = self.interrupts.hold();

        // Sync the physical files. Buffers of these relations can't be dirty
        // anymore, we just flushed them and callers hold the needed locks.
        for reln in rels.iter() {
            let data = self.registry.get(*reln)?;
            let backend = &mut self.smgrsw[data.which.index()];
            for fork in ForkNumber::ALL.iter() {
                if backend.exists(data, *fork, self.config.mode)? {
                    backend.immedsync(data, *fork)?;
                }
            }
        }

        info!("synced {} relations", rels.len());
        Ok(())
    }

    /// Remove all forks of the given relations.
    ///
    /// Cached buffers of the relations are dropped without writing them out.
    /// The handles survive, but their forks are closed and every worker is
    /// told to close its own files before any file is removed. With `is_redo`
    /// set, files that are already gone are not reported.
    ///
    /// This is called after the point of no return of a transaction, so
    /// unlink failures are only reported as warnings.
    pub fn unlink_all(
        &mut self,
        bufmgr: &mut dyn BufferManager,
        rels: &[SMgrRelation],
        is_redo: bool,
    ) -> Result<()> {
        if rels.is_empty() {
            return Ok(());
        }

        let _hold = self.interrupts.hold();

        let targets = rels
            .iter()
            .map(|reln| {
                let data = self.registry.get(*reln)?;
                Ok((data.rlocator, data.which))
            })
            .collect::<Result<Vec<(RelationLocatorBackend, SmgrWhich)>>>()?;

        let rlocators: Vec<RelationLocatorBackend> = targets.iter().map(|(r, _)| *r).collect();
        bufmgr.drop_relations_all_buffers(&rlocators);

        for reln in rels.iter() {
            let data = self.registry.get(*reln)?;
            let backend = &mut self.smgrsw[data.which.index()];
            for fork in ForkNumber::ALL.iter() {
                backend.close(data, *fork);
            }
        }

        // Other workers must close their files before they are removed, so a
        // failure below can not leave them with descriptors of deleted files.
        for rlocator in rlocators.iter() {
            self.inval.broadcast_smgr(*rlocator);
        }

        for (rlocator, which) in targets.iter() {
            let backend = &mut self.smgrsw[which.index()];
            for fork in ForkNumber::ALL.iter() {
                backend.unlink(*rlocator, *fork, is_redo);
            }
        }

        info!("unlinked {} relations", rels.len());
        Ok(())
    }

    /// Truncate the given forks of a relation to `nblocks` blocks each.
    ///
    /// `old_nblocks` is the size of each fork before the truncation. The
    /// caller must hold an exclusive lock on the relation, so no other worker
    /// can see the old size between the invalidation and the truncation.
    pub fn truncate(
        &mut self,
        bufmgr: &mut dyn BufferManager,
        reln: SMgrRelation,
        forks: &[ForkNumber],
        old_nblocks: &[BlockNumber],
        nblocks: &[BlockNumber],
    ) -> Result<()> {
        if forks.len() != old_nblocks.len() || forks.len() != nblocks.len() {
            bail!(Error::TruncateSizesMismatch {
                forks: forks.len(),
                old_nblocks: old_nblocks.len(),
                nblocks: nblocks.len(),
            });
        }

        let _hold = self.interrupts.hold();

        let rlocator = self.registry.get(reln)?.rlocator;

        // Get rid of any buffers for the blocks that are about to go away.
        bufmgr.drop_relation_buffers(rlocator, forks, nblocks);

        // Force every worker, this one included, to close its files and drop
        // any cached size before the physical truncation.
        self.inval.broadcast_smgr(rlocator);

        for (i, fork) in forks.iter().enumerate() {
            // The cached size stays unknown if the truncation fails.
            self.registry.get_mut(reln)?.cached_nblocks[fork.index()] = INVALID_BLOCK_NUMBER;

            let data = self.registry.get(reln)?;
            let exact = self.smgrsw[data.which.index()].truncate(
                data,
                *fork,
                old_nblocks[i],
                nblocks[i],
                self.config.mode,
            )?;

            // We might as well update the local cached size, even if it is
            // only trusted in recovery. A skipped truncation leaves it unknown.
            if exact {
                self.registry.get_mut(reln)?.cached_nblocks[fork.index()] = nblocks[i];
            }
        }

        info!("truncated {} forks of relation {}", forks.len(), rlocator);
        Ok(())
    }
}
