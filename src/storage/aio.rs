//! Asynchronous IO handles.
//!
//! An [AioHandle] carries a staged IO operation together with a description
//! of its target. The operation may be executed by a different worker than
//! the one that staged it, so the target is recorded as plain data and the
//! executing worker reopens the file through its own storage manager
//! ([IoWorker]).

use std::{
    fs::File,
    mem::ManuallyDrop,
    os::unix::fs::FileExt,
    os::unix::io::{FromRawFd, RawFd},
};

use anyhow::{anyhow, bail, Result};
use log::debug;

use crate::{
    relation::{ForkNumber, RelationLocator},
    storage::{smgr::StorageManager, Block, BlockNumber, BLOCK_SIZE},
    ProcNumber,
};

/// Kind of IO staged on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AioOp {
    Invalid,
    Readv,
    Writev,
}

/// Operation specific data. The descriptor is only meaningful inside the
/// worker that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AioOpData {
    pub fd: Option<RawFd>,
    pub offset: u64,
    pub nblocks: u32,
}

/// Target of an IO on a relation fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AioTargetData {
    pub rlocator: RelationLocator,
    pub fork: ForkNumber,
    pub blocknum: BlockNumber,
    pub nblocks: u32,

    /// The relation is private to the IO owner; the owner is implied by the
    /// handle.
    pub is_temp: bool,

    pub skip_fsync: bool,
}

/// Callbacks of a kind of IO target.
pub struct AioTargetInfo {
    pub name: &'static str,

    /// Resolve the descriptor of the target on the executing worker.
    pub reopen: fn(&mut StorageManager, &mut AioHandle) -> Result<()>,

    /// Human readable description of the target.
    pub describe_identity: fn(&AioTargetData, ProcNumber) -> String,
}

/// An asynchronous IO operation.
#[derive(Debug, Clone)]
pub struct AioHandle {
    owner: ProcNumber,
    op: AioOp,
    op_data: AioOpData,
    target: Option<AioTargetData>,
}

impl AioHandle {
    /// Create an idle handle owned by the given process.
    pub fn new(owner: ProcNumber) -> Self {
        Self {
            owner,
            op: AioOp::Invalid,
            op_data: AioOpData::default(),
            target: None,
        }
    }

    /// Process that issued the IO.
    pub fn owner(&self) -> ProcNumber {
        self.owner
    }

    pub fn op(&self) -> AioOp {
        self.op
    }

    pub fn op_data(&self) -> &AioOpData {
        &self.op_data
    }

    pub fn target(&self) -> Option<&AioTargetData> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: AioTargetData) {
        self.target = Some(target);
    }

    /// Set the descriptor resolved by the executing worker.
    pub fn set_fd(&mut self, fd: RawFd) {
        self.op_data.fd = Some(fd);
    }

    /// Stage a vectored read at `offset`.
    pub fn prepare_readv(&mut self, fd: Option<RawFd>, offset: u64, nblocks: u32) {
        self.op = AioOp::Readv;
        self.op_data = AioOpData { fd, offset, nblocks };
    }

    /// Stage a vectored write at `offset`.
    pub fn prepare_writev(&mut self, fd: Option<RawFd>, offset: u64, nblocks: u32) {
        self.op = AioOp::Writev;
        self.op_data = AioOpData { fd, offset, nblocks };
    }

    /// Describe the target for error messages, if there is one.
    pub fn describe_target(&self, info: &AioTargetInfo) -> Option<String> {
        self.target
            .as_ref()
            .map(|target| (info.describe_identity)(target, self.owner))
    }

    /// Return the handle to the idle state.
    pub fn reset(&mut self) {
        self.op = AioOp::Invalid;
        self.op_data = AioOpData::default();
        self.target = None;
    }
}

/// A worker that executes IO staged by other workers.
///
/// It owns its own storage manager, so the relation handles of the issuing
/// worker are never reachable from here; targets are reopened from the
/// locator recorded on the IO handle.
pub struct IoWorker {
    smgr: StorageManager,
    target_info: &'static AioTargetInfo,
}

impl IoWorker {
    pub fn new(smgr: StorageManager, target_info: &'static AioTargetInfo) -> Self {
        Self { smgr, target_info }
    }

    pub fn storage_manager(&mut self) -> &mut StorageManager {
        &mut self.smgr
    }

    /// Execute a staged read into the buffers.
    pub fn execute_readv(&mut self, ioh: &mut AioHandle, buffers: &mut [&mut Block]) -> Result<()> {
        if ioh.op() != AioOp::Readv {
            bail!("IO handle has no staged read");
        }
        self.check_buffers(ioh, buffers.len())?;

        let _hold = self.smgr.interrupts().hold();
        (self.target_info.reopen)(&mut self.smgr, ioh)?;
        let (file, offset) = self.file(ioh)?;

        for (i, buffer) in buffers.iter_mut().enumerate() {
            file.read_exact_at(&mut buffer[..], offset + (i * BLOCK_SIZE) as u64)
                .map_err(|err| anyhow!("could not read {}: {}", self.describe(ioh), err))?;
        }
        debug!("executed read of {}", self.describe(ioh));
        Ok(())
    }

    /// Execute a staged write from the buffers.
    pub fn execute_writev(&mut self, ioh: &mut AioHandle, buffers: &[&Block]) -> Result<()> {
        if ioh.op() != AioOp::Writev {
            bail!("IO handle has no staged write");
        }
        self.check_buffers(ioh, buffers.len())?;

        let _hold = self.smgr.interrupts().hold();
        (self.target_info.reopen)(&mut self.smgr, ioh)?;
        let (file, offset) = self.file(ioh)?;

        for (i, buffer) in buffers.iter().enumerate() {
            file.write_all_at(&buffer[..], offset + (i * BLOCK_SIZE) as u64)
                .map_err(|err| anyhow!("could not write {}: {}", self.describe(ioh), err))?;
        }
        debug!("executed write of {}", self.describe(ioh));
        Ok(())
    }

    /// Periodic cleanup point of the worker: service pending release
    /// requests and close relations that are no longer used.
    pub fn idle(&mut self) -> Result<()> {
        self.smgr.process_interrupts()?;
        self.smgr.accept_invalidation_messages()?;
        self.smgr.destroy_all_unpinned()
    }

    fn check_buffers(&self, ioh: &AioHandle, nbuffers: usize) -> Result<()> {
        if nbuffers != ioh.op_data().nblocks as usize {
            bail!(
                "IO on {} expects {} buffers, got {}",
                self.describe(ioh),
                ioh.op_data().nblocks,
                nbuffers
            );
        }
        Ok(())
    }

    /// Borrow the descriptor resolved by reopen as a file. The descriptor is
    /// owned by the storage manager and must not be closed here.
    fn file(&self, ioh: &AioHandle) -> Result<(ManuallyDrop<File>, u64)> {
        let op_data = ioh.op_data();
        let fd = op_data
            .fd
            .ok_or_else(|| anyhow!("IO on {} has no descriptor", self.describe(ioh)))?;
        // SAFETY: the descriptor stays open while interrupts are held, and
        // ManuallyDrop keeps it from being closed when the file goes away.
        let file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
        Ok((file, op_data.offset))
    }

    fn describe(&self, ioh: &AioHandle) -> String {
        ioh.describe_target(self.target_info)
            .unwrap_or_else(|| String::from("unknown target"))
    }
}
