use anyhow::{anyhow, bail, Result};

use crate::{
    errors::Error,
    relation::{locator::relation_path, ForkNumber, RelationLocatorBackend},
    storage::{
        aio::{AioHandle, AioOp, AioTargetData, AioTargetInfo},
        BlockNumber,
    },
    ProcNumber, INVALID_PROC_NUMBER,
};

use super::{SMgrRelationData, StorageManager};

/// Callbacks for IO on relation forks.
pub static AIO_SMGR_TARGET_INFO: AioTargetInfo = AioTargetInfo {
    name: "smgr",
    reopen: smgr_aio_reopen,
    describe_identity,
};

/// Record on the IO handle that it targets `nblocks` blocks of a relation
/// fork, starting at `blocknum`.
pub fn set_target_smgr(
    ioh: &mut AioHandle,
    reln: &SMgrRelationData,
    fork: ForkNumber,
    blocknum: BlockNumber,
    nblocks: u32,
    skip_fsync: bool,
) {
    let is_temp = reln.is_temp();
    ioh.set_target(AioTargetData {
        rlocator: reln.rlocator.locator,
        fork,
        blocknum,
        nblocks,
        is_temp,
        // Temporary relations are never synced.
        skip_fsync: skip_fsync && !is_temp,
    });
}

impl StorageManager {
    /// Resolve the descriptor of the IO target on this worker, which is not
    /// necessarily the one that staged the IO. Must be called with interrupts
    /// held, as a "release all" would close the descriptor.
    pub fn reopen(&mut self, ioh: &mut AioHandle) -> Result<()> {
        if self.interrupts.can_be_processed() {
            bail!(Error::InterruptsNotHeld("smgr aio reopen"));
        }

        let target = ioh
            .target()
            .cloned()
            .ok_or_else(|| anyhow!("IO handle has no smgr target"))?;

        // Temporary relations belong to the process that issued the IO.
        let backend = if target.is_temp {
            ioh.owner()
        } else {
            INVALID_PROC_NUMBER
        };
        let reln = self.open(RelationLocatorBackend::new(target.rlocator, backend))?;

        match ioh.op() {
            AioOp::Invalid => bail!("IO handle has no staged operation"),
            AioOp::Readv | AioOp::Writev => {
                let (fd, offset) = self.fd(reln, target.fork, target.blocknum)?;
                debug_assert_eq!(offset, ioh.op_data().offset);
                ioh.set_fd(fd);
            }
        }
        Ok(())
    }
}

fn smgr_aio_reopen(smgr: &mut StorageManager, ioh: &mut AioHandle) -> Result<()> {
    smgr.reopen(ioh)
}

/// Describe an IO target using only the recorded target data. `owner` is the
/// process that issued the IO, used to name temporary relation files.
pub fn describe_identity(target: &AioTargetData, owner: ProcNumber) -> String {
    let backend = if target.is_temp {
        owner
    } else {
        INVALID_PROC_NUMBER
    };
    let path = relation_path(&target.rlocator, backend, target.fork);

    match target.nblocks {
        0 => format!("file \"{}\"", path.display()),
        1 => format!("block {} in file \"{}\"", target.blocknum, path.display()),
        nblocks => format!(
            "blocks {}..{} in file \"{}\"",
            target.blocknum,
            target.blocknum as u64 + nblocks as u64 - 1,
            path.display()
        ),
    }
}
