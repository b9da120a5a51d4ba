#![allow(dead_code)]

use std::{cell::RefCell, os::unix::io::RawFd, rc::Rc};

use anyhow::Result;
use tinysmgr::{
    config::StorageMode,
    relation::{locator::DEFAULTTABLESPACE_OID, ForkNumber, RelationLocator, RelationLocatorBackend},
    storage::{
        aio::AioHandle,
        bufmgr::BufferManager,
        inval::InvalidationSink,
        smgr::{SMgrRelationData, SmgrBackend},
        Block, BlockNumber, SMgrRelation, StorageManager,
    },
};

pub fn rlocator(database: u32, oid: u32) -> RelationLocatorBackend {
    RelationLocatorBackend::shared(RelationLocator::new(DEFAULTTABLESPACE_OID, database, oid))
}

/// Something observed by the recording collaborators, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FlushBuffers(usize),
    DropAllBuffers(Vec<RelationLocatorBackend>),
    DropBuffers(Vec<ForkNumber>, Vec<BlockNumber>),
    Broadcast(RelationLocatorBackend),
    Close(ForkNumber),
    Unlink(RelationLocatorBackend, ForkNumber),
    /// Truncate call, with the cached size seen by the backend at that time.
    Truncate(ForkNumber, BlockNumber),
    Immedsync(ForkNumber),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn position(log: &EventLog, event: &Event) -> Option<usize> {
    log.borrow().iter().position(|e| e == event)
}

pub fn count(log: &EventLog, event: &Event) -> usize {
    log.borrow().iter().filter(|e| *e == event).count()
}

pub struct RecordingSink(pub EventLog);

impl InvalidationSink for RecordingSink {
    fn broadcast_smgr(&mut self, rlocator: RelationLocatorBackend) {
        self.0.borrow_mut().push(Event::Broadcast(rlocator));
    }
}

pub struct RecordingBuffers(pub EventLog);

impl BufferManager for RecordingBuffers {
    fn flush_relations_all_buffers(
        &mut self,
        _smgr: &mut StorageManager,
        rels: &[SMgrRelation],
    ) -> Result<()> {
        self.0.borrow_mut().push(Event::FlushBuffers(rels.len()));
        Ok(())
    }

    fn drop_relations_all_buffers(&mut self, rlocators: &[RelationLocatorBackend]) {
        self.0
            .borrow_mut()
            .push(Event::DropAllBuffers(rlocators.to_vec()));
    }

    fn drop_relation_buffers(
        &mut self,
        _rlocator: RelationLocatorBackend,
        forks: &[ForkNumber],
        first_blocks: &[BlockNumber],
    ) {
        self.0
            .borrow_mut()
            .push(Event::DropBuffers(forks.to_vec(), first_blocks.to_vec()));
    }
}

/// Backend that records the calls it receives and forwards them to another
/// backend.
pub struct RecordingBackend {
    pub inner: Box<dyn SmgrBackend>,
    pub log: EventLog,
}

impl SmgrBackend for RecordingBackend {
    fn open(&mut self, reln: &SMgrRelationData) {
        self.inner.open(reln)
    }

    fn close(&mut self, reln: &SMgrRelationData, fork: ForkNumber) {
        self.log.borrow_mut().push(Event::Close(fork));
        self.inner.close(reln, fork)
    }

    fn create(&mut self, reln: &SMgrRelationData, fork: ForkNumber, is_redo: bool) -> Result<()> {
        self.inner.create(reln, fork, is_redo)
    }

    fn exists(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        mode: StorageMode,
    ) -> Result<bool> {
        self.inner.exists(reln, fork, mode)
    }

    fn unlink(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber, is_redo: bool) {
        self.log.borrow_mut().push(Event::Unlink(rlocator, fork));
        self.inner.unlink(rlocator, fork, is_redo)
    }

    fn extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        skip_fsync: bool,
    ) -> Result<()> {
        self.inner.extend(reln, fork, blocknum, block, skip_fsync)
    }

    fn zero_extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
        skip_fsync: bool,
    ) -> Result<()> {
        self.inner
            .zero_extend(reln, fork, blocknum, nblocks, skip_fsync)
    }

    fn prefetch(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<bool> {
        self.inner.prefetch(reln, fork, blocknum, nblocks)
    }

    fn max_combine(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> u32 {
        self.inner.max_combine(reln, fork, blocknum)
    }

    fn readv(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &mut [&mut Block],
    ) -> Result<()> {
        self.inner.readv(reln, fork, blocknum, buffers)
    }

    fn start_readv(
        &mut self,
        ioh: &mut AioHandle,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        self.inner.start_readv(ioh, reln, fork, blocknum, nblocks)
    }

    fn writev(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &[&Block],
        skip_fsync: bool,
    ) -> Result<()> {
        self.inner.writev(reln, fork, blocknum, buffers, skip_fsync)
    }

    fn writeback(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        self.inner.writeback(reln, fork, blocknum, nblocks)
    }

    fn nblocks(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<BlockNumber> {
        self.inner.nblocks(reln, fork)
    }

    fn truncate(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        old_blocks: BlockNumber,
        nblocks: BlockNumber,
        mode: StorageMode,
    ) -> Result<bool> {
        self.log
            .borrow_mut()
            .push(Event::Truncate(fork, reln.cached_nblocks(fork)));
        self.inner.truncate(reln, fork, old_blocks, nblocks, mode)
    }

    fn immedsync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()> {
        self.log.borrow_mut().push(Event::Immedsync(fork));
        self.inner.immedsync(reln, fork)
    }

    fn registersync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()> {
        self.inner.registersync(reln, fork)
    }

    fn sync_pending(&mut self) -> Result<()> {
        self.inner.sync_pending()
    }

    fn fd(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> Result<(RawFd, u64)> {
        self.inner.fd(reln, fork, blocknum)
    }
}
