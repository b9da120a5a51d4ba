use anyhow::{anyhow, bail, Result};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    config::StorageMode,
    errors,
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{
        aio::AioHandle,
        block_range_end,
        smgr::{SMgrRelationData, SmgrBackend},
        Block, BlockNumber, Error, BLOCK_SIZE, INVALID_BLOCK_NUMBER,
    },
};

type ForkKey = (RelationLocatorBackend, ForkNumber);

/// In-memory storage shared by every context that holds a clone of it, the
/// way a file system is shared by every process.
#[derive(Debug, Clone, Default)]
pub struct MemVolume {
    forks: Arc<Mutex<HashMap<ForkKey, Vec<Block>>>>,
}

impl MemVolume {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ForkKey, Vec<Block>>>> {
        self.forks
            .lock()
            .map_err(|_| anyhow!("memory volume lock poisoned"))
    }

    /// Return the number of blocks of a fork, or None if it does not exist.
    pub fn fork_size(&self, rlocator: &RelationLocatorBackend, fork: ForkNumber) -> Option<u32> {
        let forks = self.forks.lock().ok()?;
        forks
            .get(&(*rlocator, fork))
            .map(|blocks| blocks.len() as BlockNumber)
    }
}

/// Storage backend that keeps relation forks on a [MemVolume].
///
/// There are no file descriptors here, so asynchronous IO is not supported.
#[derive(Debug)]
pub struct MemBackend {
    volume: MemVolume,

    /// Forks accessed since they were last closed.
    open: HashSet<ForkKey>,
}

impl MemBackend {
    pub fn new(volume: MemVolume) -> Self {
        Self {
            volume,
            open: HashSet::new(),
        }
    }

    pub fn volume(&self) -> &MemVolume {
        &self.volume
    }

    /// Return the number of forks accessed since they were last closed.
    pub fn num_open_forks(&self) -> usize {
        self.open.len()
    }

    /// Run `f` over the blocks of an existing fork.
    fn with_fork<T>(
        &mut self,
        rlocator: RelationLocatorBackend,
        fork: ForkNumber,
        f: impl FnOnce(&mut Vec<Block>) -> Result<T>,
    ) -> Result<T> {
        let key = (rlocator, fork);
        let mut forks = self.volume.lock()?;
        match forks.get_mut(&key) {
            Some(blocks) => {
                self.open.insert(key);
                f(blocks)
            }
            None => bail!(Error::FileNotFound(rlocator.path(fork))),
        }
    }
}

fn validate_range(
    blocks: &[Block],
    fork: ForkNumber,
    blocknum: BlockNumber,
    nblocks: u32,
) -> Result<()> {
    let end = block_range_end(fork, blocknum, nblocks)?;
    if end as usize > blocks.len() {
        bail!(Error::BlockOutOfRange {
            fork,
            first: blocknum,
            last: end.saturating_sub(1),
            nblocks: blocks.len() as BlockNumber,
        });
    }
    Ok(())
}

/// Make the fork `end` blocks long, filling new blocks with zeroes.
fn grow(blocks: &mut Vec<Block>, end: BlockNumber) {
    if blocks.len() < end as usize {
        blocks.resize(end as usize, [0; BLOCK_SIZE]);
    }
}

impl SmgrBackend for MemBackend {
    fn open(&mut self, _reln: &SMgrRelationData) {}

    fn close(&mut self, reln: &SMgrRelationData, fork: ForkNumber) {
        self.open.remove(&(reln.rlocator(), fork));
    }

    fn create(&mut self, reln: &SMgrRelationData, fork: ForkNumber, is_redo: bool) -> Result<()> {
        let key = (reln.rlocator(), fork);
        let mut forks = self.volume.lock()?;
        if forks.contains_key(&key) {
            if !is_redo {
                bail!(Error::FileAlreadyExists(reln.rlocator().path(fork)));
            }
        } else {
            forks.insert(key, Vec::new());
            debug!("created memory fork {} of {}", fork, reln.rlocator());
        }
        self.open.insert(key);
        Ok(())
    }

    fn exists(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        _mode: StorageMode,
    ) -> Result<bool> {
        Ok(self.volume.lock()?.contains_key(&(reln.rlocator(), fork)))
    }

    fn unlink(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber, is_redo: bool) {
        let key = (rlocator, fork);
        self.open.remove(&key);

        let removed = match self.volume.lock() {
            Ok(mut forks) => forks.remove(&key).is_some(),
            Err(err) => {
                warn!("could not remove memory fork {} of {}: {}", fork, rlocator, err);
                return;
            }
        };
        if removed {
            debug!("removed memory fork {} of {}", fork, rlocator);
        } else if !is_redo {
            warn!(
                "could not remove memory fork {} of {}: no such fork",
                fork,
                rlocator
            );
        }
    }

    fn extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        _skip_fsync: bool,
    ) -> Result<()> {
        if blocknum == INVALID_BLOCK_NUMBER {
            bail!(Error::InvalidBlockNumber(fork));
        }
        self.with_fork(reln.rlocator(), fork, |blocks| {
            grow(blocks, blocknum + 1);
            blocks[blocknum as usize] = *block;
            Ok(())
        })
    }

    fn zero_extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
        _skip_fsync: bool,
    ) -> Result<()> {
        let end = block_range_end(fork, blocknum, nblocks)?;
        if end == INVALID_BLOCK_NUMBER && nblocks > 0 {
            bail!(Error::InvalidBlockNumber(fork));
        }
        self.with_fork(reln.rlocator(), fork, |blocks| {
            grow(blocks, end);
            for block in blocks[blocknum as usize..end as usize].iter_mut() {
                *block = [0; BLOCK_SIZE];
            }
            Ok(())
        })
    }

    fn prefetch(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        _blocknum: BlockNumber,
        _nblocks: u32,
    ) -> Result<bool> {
        Ok(self.volume.lock()?.contains_key(&(reln.rlocator(), fork)))
    }

    fn max_combine(
        &mut self,
        _reln: &SMgrRelationData,
        _fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> u32 {
        // No segment boundaries, only the block number space limits an IO.
        INVALID_BLOCK_NUMBER - blocknum
    }

    fn readv(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &mut [&mut Block],
    ) -> Result<()> {
        self.with_fork(reln.rlocator(), fork, |blocks| {
            validate_range(blocks, fork, blocknum, buffers.len() as u32)?;
            for (i, buffer) in buffers.iter_mut().enumerate() {
                **buffer = blocks[blocknum as usize + i];
            }
            Ok(())
        })
    }

    fn start_readv(
        &mut self,
        _ioh: &mut AioHandle,
        _reln: &SMgrRelationData,
        _fork: ForkNumber,
        _blocknum: BlockNumber,
        _nblocks: u32,
    ) -> Result<()> {
        bail!(errors::Error::Unsupported("mem", "asynchronous reads"))
    }

    fn writev(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &[&Block],
        _skip_fsync: bool,
    ) -> Result<()> {
        self.with_fork(reln.rlocator(), fork, |blocks| {
            validate_range(blocks, fork, blocknum, buffers.len() as u32)?;
            for (i, buffer) in buffers.iter().enumerate() {
                blocks[blocknum as usize + i] = **buffer;
            }
            Ok(())
        })
    }

    fn writeback(
        &mut self,
        _reln: &SMgrRelationData,
        _fork: ForkNumber,
        _blocknum: BlockNumber,
        _nblocks: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn nblocks(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<BlockNumber> {
        self.with_fork(reln.rlocator(), fork, |blocks| {
            Ok(blocks.len() as BlockNumber)
        })
    }

    fn truncate(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        _old_blocks: BlockNumber,
        nblocks: BlockNumber,
        mode: StorageMode,
    ) -> Result<bool> {
        self.with_fork(reln.rlocator(), fork, |blocks| {
            let current = blocks.len() as BlockNumber;
            if nblocks > current {
                if mode.in_recovery() {
                    return Ok(false);
                }
                bail!(Error::TruncateBeyondEnd {
                    fork,
                    nblocks,
                    current,
                });
            }
            blocks.truncate(nblocks as usize);
            Ok(true)
        })
    }

    fn immedsync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()> {
        // Nothing to sync, only check that the fork exists.
        self.with_fork(reln.rlocator(), fork, |_| Ok(()))
    }

    fn registersync(&mut self, _reln: &SMgrRelationData, _fork: ForkNumber) -> Result<()> {
        Ok(())
    }

    fn fd(
        &mut self,
        _reln: &SMgrRelationData,
        _fork: ForkNumber,
        _blocknum: BlockNumber,
    ) -> Result<(RawFd, u64)> {
        bail!(errors::Error::Unsupported("mem", "file descriptors"))
    }
}
