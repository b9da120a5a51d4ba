//! Storage manager.
//!
//! The storage manager mediates every physical operation done on behalf of a
//! relation. It keeps a registry of relation handles keyed by relation
//! locator and routes each operation to the backend that governs the
//! relation.
//!
//! Handles are opened lazily and stay around until they are destroyed. A
//! handle with a pin count of 0 is destroyed at the end of the transaction
//! ([at_eoxact](StorageManager::at_eoxact)); pinning it keeps it alive across
//! that point. Releasing a handle closes its files but keeps it registered.
//!
//! Every public operation holds interrupts for its duration, so a pending
//! "release all" request is only serviced at a safe point
//! ([process_interrupts](StorageManager::process_interrupts)) and never sees
//! the registry half updated.

mod aio;
mod backend;
mod bulk;
mod registry;
mod unpinned;

use std::{os::unix::io::RawFd, rc::Rc, sync::mpsc::Receiver};

use anyhow::{bail, Result};
use log::debug;

use crate::{
    config::{Config, StorageMode},
    errors::Error,
    interrupts::{Interrupts, ReleaseSignal},
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{
        aio::AioHandle,
        inval::{InvalidationBus, InvalidationSink},
        md::MdBackend,
        mem::{MemBackend, MemVolume},
        Block, BlockNumber, INVALID_BLOCK_NUMBER,
    },
};

pub use self::aio::{describe_identity, set_target_smgr, AIO_SMGR_TARGET_INFO};
pub use self::backend::{SmgrBackend, SmgrWhich, NSMGR};
pub use self::registry::{SMgrRelation, SMgrRelationData};

use self::registry::Registry;

/// Storage manager context of a single worker.
pub struct StorageManager {
    config: Config,

    /// Dispatch table, indexed by [SmgrWhich].
    smgrsw: Vec<Box<dyn SmgrBackend>>,

    registry: Registry,

    interrupts: Rc<Interrupts>,

    /// Outgoing smgr invalidation messages.
    inval: Box<dyn InvalidationSink>,

    /// Incoming smgr invalidation messages, if subscribed to a bus.
    inval_inbox: Option<Receiver<RelationLocatorBackend>>,
}

impl StorageManager {
    /// Create a storage manager with the default dispatch table: files under
    /// the configured data directory and a private in-memory volume.
    /// Invalidations are delivered on a private bus, so only this context
    /// receives its own messages.
    pub fn new(config: Config) -> Result<Self> {
        let interrupts = Interrupts::new();
        let _hold = interrupts.hold();

        let mut smgrsw: Vec<Box<dyn SmgrBackend>> = vec![
            Box::new(MdBackend::new(&config.data_dir, config.io_combine_limit)),
            Box::new(MemBackend::new(MemVolume::new())),
        ];
        debug_assert_eq!(smgrsw.len(), NSMGR);
        for backend in smgrsw.iter_mut() {
            backend.init()?;
        }

        let bus = InvalidationBus::new();
        let inval_inbox = Some(bus.subscribe());

        debug!("storage manager initialized at {}", config.data_dir.display());
        Ok(Self {
            registry: Registry::with_capacity(config.registry_capacity),
            config,
            smgrsw,
            interrupts: interrupts.clone(),
            inval: Box::new(bus),
            inval_inbox,
        })
    }

    /// Replace an entry of the dispatch table. The new backend is initialized
    /// and the old one is shut down.
    pub fn with_backend(
        mut self,
        which: SmgrWhich,
        mut backend: Box<dyn SmgrBackend>,
    ) -> Result<Self> {
        let _hold = self.interrupts.hold();
        backend.init()?;
        let mut old = std::mem::replace(&mut self.smgrsw[which.index()], backend);
        old.shutdown();
        Ok(self)
    }

    /// Store in-memory relations on a volume shared with other contexts.
    pub fn with_mem_volume(self, volume: MemVolume) -> Result<Self> {
        self.with_backend(SmgrWhich::Mem, Box::new(MemBackend::new(volume)))
    }

    /// Send and receive invalidations through a bus shared with other
    /// contexts.
    pub fn with_invalidation_bus(mut self, bus: &InvalidationBus) -> Self {
        self.inval_inbox = Some(bus.subscribe());
        self.inval = Box::new(bus.clone());
        self
    }

    /// Send invalidations to a custom sink. This context will not receive
    /// invalidation messages anymore.
    pub fn with_invalidation_sink(mut self, sink: Box<dyn InvalidationSink>) -> Self {
        self.inval_inbox = None;
        self.inval = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Switch between normal execution and recovery.
    pub fn set_mode(&mut self, mode: StorageMode) {
        self.config.mode = mode;
    }

    pub fn interrupts(&self) -> &Rc<Interrupts> {
        &self.interrupts
    }

    /// Handle that other threads can use to ask this context to release all
    /// of its relations.
    pub fn release_signal(&self) -> ReleaseSignal {
        self.interrupts.release_signal()
    }

    /// Return a handle for the given relation, creating it if needed.
    ///
    /// This does not attempt to actually open the underlying files.
    pub fn open(&mut self, rlocator: RelationLocatorBackend) -> Result<SMgrRelation> {
        let _hold = self.interrupts.hold();
        rlocator.validate()?;

        if let Some(reln) = self.registry.lookup(&rlocator) {
            return Ok(reln);
        }

        let reln = self.registry.insert(rlocator, self.config.default_backend);
        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].open(data);
        debug!("opened smgr relation {} on {}", rlocator, data.which);
        Ok(reln)
    }

    /// Return true if a handle for the relation is registered.
    pub fn contains(&self, rlocator: &RelationLocatorBackend) -> bool {
        self.registry.lookup(rlocator).is_some()
    }

    /// Return the handle data.
    pub fn relation(&self, reln: SMgrRelation) -> Result<&SMgrRelationData> {
        self.registry.get(reln)
    }

    /// Number of registered handles.
    pub fn num_relations(&self) -> usize {
        self.registry.len()
    }

    /// Number of handles eligible for destruction.
    pub fn num_unpinned(&self) -> usize {
        self.registry.unpinned_len()
    }

    /// Return true if the handle will be destroyed at the end of the transaction.
    pub fn is_unpinned(&self, reln: SMgrRelation) -> bool {
        self.registry.is_unpinned(reln)
    }

    /// Prevent the handle from being destroyed at the end of the transaction.
    pub fn pin(&mut self, reln: SMgrRelation) -> Result<()> {
        let _hold = self.interrupts.hold();
        self.registry.pin(reln)
    }

    /// Undo a previous [pin](StorageManager::pin). Unpinning a handle that is
    /// not pinned is an error.
    pub fn unpin(&mut self, reln: SMgrRelation) -> Result<()> {
        let _hold = self.interrupts.hold();
        self.registry.unpin(reln)
    }

    /// Close all forks of an unpinned handle and remove it from the registry.
    fn destroy(&mut self, reln: SMgrRelation) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        if data.pincount > 0 {
            bail!(Error::RegistryCorrupted);
        }
        let backend = &mut self.smgrsw[data.which.index()];
        for fork in ForkNumber::ALL.iter() {
            backend.close(data, *fork);
        }

        let data = self.registry.remove(reln)?;
        debug!("destroyed smgr relation {}", data.rlocator);
        Ok(())
    }

    /// Close all forks of the relation and forget its cached state. The handle
    /// itself stays registered and valid.
    pub fn release(&mut self, reln: SMgrRelation) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        let backend = &mut self.smgrsw[data.which.index()];
        for fork in ForkNumber::ALL.iter() {
            backend.close(data, *fork);
        }
        self.registry.get_mut(reln)?.reset_cache();
        Ok(())
    }

    /// Same as [release](StorageManager::release).
    pub fn close(&mut self, reln: SMgrRelation) -> Result<()> {
        self.release(reln)
    }

    /// Destroy every handle that is not pinned.
    pub fn destroy_all_unpinned(&mut self) -> Result<()> {
        let _hold = self.interrupts.hold();

        for reln in self.registry.unpinned()? {
            self.destroy(reln)?;
        }
        Ok(())
    }

    /// Release every registered handle, pinned or not.
    pub fn release_all(&mut self) -> Result<()> {
        let _hold = self.interrupts.hold();

        for reln in self.registry.handles() {
            self.release(reln)?;
        }
        debug!("released all smgr relations");
        Ok(())
    }

    /// Release the handle of a relation if there is one. No handle is
    /// created if absent.
    pub fn release_by_locator(&mut self, rlocator: &RelationLocatorBackend) -> Result<()> {
        let _hold = self.interrupts.hold();

        match self.registry.lookup(rlocator) {
            Some(reln) => self.release(reln),
            None => Ok(()),
        }
    }

    /// End of transaction cleanup. Pending invalidations are applied first so
    /// the inbox does not outlive the transaction.
    pub fn at_eoxact(&mut self) -> Result<()> {
        self.accept_invalidation_messages()?;
        self.destroy_all_unpinned()
    }

    /// Handle a "release all" barrier. Return true once the barrier was
    /// absorbed.
    pub fn process_barrier_release(&mut self) -> Result<bool> {
        self.release_all()?;
        Ok(true)
    }

    /// Safe point: service a pending "release all" request, if interrupts are
    /// not held. Return true if a request was serviced.
    pub fn process_interrupts(&mut self) -> Result<bool> {
        if !self.interrupts.take_pending_release() {
            return Ok(false);
        }
        self.process_barrier_release()
    }

    /// Release every relation named by the invalidation messages received so
    /// far. Return the number of messages processed.
    pub fn accept_invalidation_messages(&mut self) -> Result<usize> {
        let messages: Vec<RelationLocatorBackend> = match &self.inval_inbox {
            Some(inbox) => inbox.try_iter().collect(),
            None => return Ok(0),
        };
        for rlocator in messages.iter() {
            self.release_by_locator(rlocator)?;
        }
        Ok(messages.len())
    }

    /// Return true if the fork exists.
    pub fn exists(&mut self, reln: SMgrRelation, fork: ForkNumber) -> Result<bool> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].exists(data, fork, self.config.mode)
    }

    /// Create a new fork.
    ///
    /// On recovery (`is_redo`), it is fine if the fork already exists.
    pub fn create(&mut self, reln: SMgrRelation, fork: ForkNumber, is_redo: bool) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].create(data, fork, is_redo)
    }

    /// Add a new block at the end of a fork, `blocknum` being the current
    /// size of the fork.
    ///
    /// The block is written through the backend but not synced, that is
    /// deferred to the next checkpoint unless `skip_fsync` is set, in which
    /// case the caller takes care of syncing the relation.
    pub fn extend(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        skip_fsync: bool,
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].extend(data, fork, blocknum, block, skip_fsync)?;

        // Only keep the cached size if we know it was exact before the call.
        let cached = &mut self.registry.get_mut(reln)?.cached_nblocks[fork.index()];
        *cached = if *cached == blocknum {
            blocknum + 1
        } else {
            INVALID_BLOCK_NUMBER
        };
        Ok(())
    }

    /// Add `nblocks` zeroed blocks at the end of a fork.
    pub fn zero_extend(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
        skip_fsync: bool,
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].zero_extend(data, fork, blocknum, nblocks, skip_fsync)?;

        let cached = &mut self.registry.get_mut(reln)?.cached_nblocks[fork.index()];
        *cached = if *cached == blocknum {
            blocknum + nblocks
        } else {
            INVALID_BLOCK_NUMBER
        };
        Ok(())
    }

    /// Initiate an asynchronous read of a range of blocks. Return false if the
    /// fork does not exist, which is expected during recovery when a later
    /// record removed the file.
    pub fn prefetch(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<bool> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].prefetch(data, fork, blocknum, nblocks)
    }

    /// Return how many consecutive blocks starting at `blocknum` can be
    /// combined into a single IO.
    pub fn max_combine(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> Result<u32> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        Ok(self.smgrsw[data.which.index()].max_combine(data, fork, blocknum))
    }

    /// Read consecutive blocks, starting at `blocknum`, into the buffers.
    pub fn readv(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &mut [&mut Block],
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].readv(data, fork, blocknum, buffers)
    }

    /// Read a single block.
    pub fn read(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &mut Block,
    ) -> Result<()> {
        self.readv(reln, fork, blocknum, &mut [block])
    }

    /// Stage an asynchronous read of `nblocks` blocks on the IO handle. The
    /// read is executed later, possibly by another worker.
    pub fn start_readv(
        &mut self,
        ioh: &mut AioHandle,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].start_readv(ioh, data, fork, blocknum, nblocks)
    }

    /// Write the buffers over existing blocks, starting at `blocknum`.
    ///
    /// This is not meant to extend a fork, use [extend](StorageManager::extend).
    pub fn writev(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &[&Block],
        skip_fsync: bool,
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].writev(data, fork, blocknum, buffers, skip_fsync)
    }

    /// Write a single block.
    pub fn write(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        skip_fsync: bool,
    ) -> Result<()> {
        self.writev(reln, fork, blocknum, &[block], skip_fsync)
    }

    /// Hint the backend that the blocks should be written to the device. This
    /// gives no durability guarantee.
    pub fn writeback(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].writeback(data, fork, blocknum, nblocks)
    }

    /// Return the number of blocks of a fork.
    pub fn nblocks(&mut self, reln: SMgrRelation, fork: ForkNumber) -> Result<BlockNumber> {
        let cached = self.nblocks_cached(reln, fork)?;
        if cached != INVALID_BLOCK_NUMBER {
            return Ok(cached);
        }

        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        let nblocks = self.smgrsw[data.which.index()].nblocks(data, fork)?;
        self.registry.get_mut(reln)?.cached_nblocks[fork.index()] = nblocks;
        Ok(nblocks)
    }

    /// Return the cached number of blocks of a fork, or
    /// [INVALID_BLOCK_NUMBER] if it is not known.
    ///
    /// Other workers can extend a relation at any time, so the cache is only
    /// trusted in recovery, where this worker is the only one changing
    /// relations.
    pub fn nblocks_cached(&self, reln: SMgrRelation, fork: ForkNumber) -> Result<BlockNumber> {
        let data = self.registry.get(reln)?;
        if self.config.mode.in_recovery() {
            return Ok(data.cached_nblocks[fork.index()]);
        }
        Ok(INVALID_BLOCK_NUMBER)
    }

    /// Set the insertion target block hint of the relation.
    pub fn set_targblock(&mut self, reln: SMgrRelation, blocknum: BlockNumber) -> Result<()> {
        self.registry.get_mut(reln)?.targblock = blocknum;
        Ok(())
    }

    /// Ask the backend to sync the fork at the next checkpoint.
    pub fn register_sync(&mut self, reln: SMgrRelation, fork: ForkNumber) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].registersync(data, fork)
    }

    /// Sync the fork to durable storage now.
    pub fn immedsync(&mut self, reln: SMgrRelation, fork: ForkNumber) -> Result<()> {
        let _hold = self.interrupts.hold();

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].immedsync(data, fork)
    }

    /// Flush every sync request registered on every backend. This is the
    /// checkpoint side of [register_sync](StorageManager::register_sync).
    pub fn sync_pending(&mut self) -> Result<()> {
        let _hold = self.interrupts.hold();

        for backend in self.smgrsw.iter_mut() {
            backend.sync_pending()?;
        }
        Ok(())
    }

    /// Return the descriptor and byte offset of a block.
    ///
    /// Must be called with interrupts held: a "release all" serviced in
    /// between would close the returned descriptor.
    pub(crate) fn fd(
        &mut self,
        reln: SMgrRelation,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> Result<(RawFd, u64)> {
        if self.interrupts.can_be_processed() {
            bail!(Error::InterruptsNotHeld("smgr fd"));
        }

        let data = self.registry.get(reln)?;
        self.smgrsw[data.which.index()].fd(data, fork, blocknum)
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        let _hold = self.interrupts.hold();
        for backend in self.smgrsw.iter_mut() {
            backend.shutdown();
        }
    }
}
