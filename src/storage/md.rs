use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::{
    config::StorageMode,
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{
        aio::AioHandle,
        block_range_end,
        smgr::{set_target_smgr, SMgrRelationData, SmgrBackend},
        Block, BlockNumber, Error, BLOCK_SIZE, INVALID_BLOCK_NUMBER,
    },
};

/// A block of zeroes used to extend files.
const ZERO_BLOCK: Block = [0; BLOCK_SIZE];

type ForkKey = (RelationLocatorBackend, ForkNumber);

/// Magnetic disk storage backend.
///
/// Each relation fork is a plain file under the data directory, named after
/// the relation locator (see [relation_path](crate::relation::locator::relation_path)).
/// Blocks are stored back to back, block N starting at byte N * [BLOCK_SIZE].
///
/// Files are opened lazily on first access and stay open until the fork is
/// closed. Writes are not synced right away: unless the caller asks to skip
/// it, the fork is remembered and synced at the next checkpoint by
/// [sync_pending](SmgrBackend::sync_pending).
#[derive(Debug)]
pub struct MdBackend {
    data_dir: PathBuf,
    io_combine_limit: u32,
    files: HashMap<ForkKey, File>,
    pending_syncs: HashSet<ForkKey>,
}

impl MdBackend {
    pub fn new(data_dir: &Path, io_combine_limit: u32) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            io_combine_limit: io_combine_limit.max(1),
            files: HashMap::new(),
            pending_syncs: HashSet::new(),
        }
    }

    /// Return the number of forks currently open.
    pub fn num_open_files(&self) -> usize {
        self.files.len()
    }

    /// Return the absolute path of a fork file.
    fn path(&self, rlocator: &RelationLocatorBackend, fork: ForkNumber) -> PathBuf {
        self.data_dir.join(rlocator.path(fork))
    }

    /// Open the fork file if needed. Return None if the file does not exist.
    fn open_fork(
        &mut self,
        rlocator: RelationLocatorBackend,
        fork: ForkNumber,
    ) -> Result<Option<&File>> {
        let key = (rlocator, fork);
        if !self.files.contains_key(&key) {
            let path = self.path(&rlocator, fork);
            match OpenOptions::new().read(true).write(true).open(&path) {
                Ok(file) => {
                    debug!("opened file {}", path.display());
                    self.files.insert(key, file);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("could not open file \"{}\"", path.display()))
                }
            }
        }
        Ok(self.files.get(&key))
    }

    /// Open the fork file, failing if it does not exist.
    fn file(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber) -> Result<&File> {
        let path = self.path(&rlocator, fork);
        match self.open_fork(rlocator, fork)? {
            Some(file) => Ok(file),
            None => bail!(Error::FileNotFound(path)),
        }
    }

    /// Computes the number of blocks of a fork.
    fn size(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber) -> Result<BlockNumber> {
        let len = self.file(rlocator, fork)?.metadata()?.len();
        Ok((len / BLOCK_SIZE as u64) as BlockNumber)
    }

    /// Check that the block range is inside the fork.
    fn validate_range(
        &mut self,
        rlocator: RelationLocatorBackend,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        let end = block_range_end(fork, blocknum, nblocks)?;
        let current = self.size(rlocator, fork)?;
        if end > current {
            bail!(Error::BlockOutOfRange {
                fork,
                first: blocknum,
                last: end.saturating_sub(1),
                nblocks: current,
            });
        }
        Ok(())
    }

    /// Remember that the fork must be synced at the next checkpoint.
    fn register_dirty(&mut self, reln: &SMgrRelationData, fork: ForkNumber, skip_fsync: bool) {
        if !skip_fsync && !reln.is_temp() {
            self.pending_syncs.insert((reln.rlocator(), fork));
        }
    }

    /// Returns the offset on fork file where a block start.
    fn offset(blocknum: BlockNumber) -> u64 {
        blocknum as u64 * BLOCK_SIZE as u64
    }

    /// Sync a fork registered for the next checkpoint.
    fn sync_fork(&mut self, (rlocator, fork): ForkKey) -> Result<()> {
        let path = self.path(&rlocator, fork);
        // The fork may have been removed since the request was made.
        if let Some(file) = self.open_fork(rlocator, fork)? {
            file.sync_all()
                .with_context(|| format!("could not fsync file \"{}\"", path.display()))?;
        }
        Ok(())
    }
}

/// Tell the kernel that a byte range of the file will be read soon.
#[cfg(target_os = "linux")]
fn advise_willneed(file: &File, offset: u64, len: u64) {
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let rc = unsafe {
        libc::posix_fadvise(
            file.as_raw_fd(),
            offset as libc::off_t,
            len as libc::off_t,
            libc::POSIX_FADV_WILLNEED,
        )
    };
    if rc != 0 {
        debug!(
            "posix_fadvise failed: {}",
            std::io::Error::from_raw_os_error(rc)
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_willneed(_file: &File, _offset: u64, _len: u64) {}

/// Start writing back the dirty pages of a byte range of the file without
/// waiting for them.
#[cfg(target_os = "linux")]
fn start_writeback(file: &File, offset: u64, len: u64) -> std::io::Result<()> {
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let rc = unsafe {
        libc::sync_file_range(
            file.as_raw_fd(),
            offset as libc::off64_t,
            len as libc::off64_t,
            libc::SYNC_FILE_RANGE_WRITE,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn start_writeback(file: &File, _offset: u64, _len: u64) -> std::io::Result<()> {
    file.sync_data()
}

impl SmgrBackend for MdBackend {
    fn open(&mut self, reln: &SMgrRelationData) {
        // Files are opened on first access.
        debug!("md open {}", reln.rlocator());
    }

    fn close(&mut self, reln: &SMgrRelationData, fork: ForkNumber) {
        if self.files.remove(&(reln.rlocator(), fork)).is_some() {
            debug!("closed fork {} of {}", fork, reln.rlocator());
        }
    }

    fn create(&mut self, reln: &SMgrRelationData, fork: ForkNumber, is_redo: bool) -> Result<()> {
        let rlocator = reln.rlocator();
        let key = (rlocator, fork);
        if is_redo && self.files.contains_key(&key) {
            // Already created.
            return Ok(());
        }

        let path = self.path(&rlocator, fork);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create directory \"{}\"", parent.display()))?;
        }

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if !is_redo {
                    bail!(Error::FileAlreadyExists(path));
                }
                // Replay may create a file that already exists, just open it.
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .with_context(|| format!("could not open file \"{}\"", path.display()))?
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("could not create file \"{}\"", path.display()))
            }
        };

        debug!("created file {}", path.display());
        self.files.insert(key, file);
        Ok(())
    }

    fn exists(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        mode: StorageMode,
    ) -> Result<bool> {
        // Close the fork first, so that a descriptor of a file removed by
        // another worker is not mistaken for an existing fork. Recovery is
        // the only writer and can trust its open files.
        if !mode.in_recovery() {
            self.close(reln, fork);
        }
        Ok(self.open_fork(reln.rlocator(), fork)?.is_some())
    }

    fn unlink(&mut self, rlocator: RelationLocatorBackend, fork: ForkNumber, is_redo: bool) {
        let key = (rlocator, fork);
        self.files.remove(&key);
        self.pending_syncs.remove(&key);

        let path = self.path(&rlocator, fork);
        match fs::remove_file(&path) {
            Ok(()) => debug!("removed file {}", path.display()),
            Err(err) if is_redo && err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("could not remove file \"{}\": {}", path.display(), err),
        }
    }

    fn extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        block: &Block,
        skip_fsync: bool,
    ) -> Result<()> {
        if blocknum == INVALID_BLOCK_NUMBER {
            bail!(Error::InvalidBlockNumber(fork));
        }

        let path = self.path(&reln.rlocator(), fork);
        let file = self.file(reln.rlocator(), fork)?;
        file.write_all_at(block, Self::offset(blocknum))
            .with_context(|| format!("could not extend file \"{}\"", path.display()))?;
        debug!("extended {} with block {}", path.display(), blocknum);

        self.register_dirty(reln, fork, skip_fsync);
        Ok(())
    }

    fn zero_extend(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
        skip_fsync: bool,
    ) -> Result<()> {
        let end = block_range_end(fork, blocknum, nblocks)?;
        if end == INVALID_BLOCK_NUMBER && nblocks > 0 {
            bail!(Error::InvalidBlockNumber(fork));
        }

        let path = self.path(&reln.rlocator(), fork);
        let file = self.file(reln.rlocator(), fork)?;
        for blkno in blocknum..end {
            file.write_all_at(&ZERO_BLOCK, Self::offset(blkno))
                .with_context(|| format!("could not extend file \"{}\"", path.display()))?;
        }
        debug!(
            "extended {} with {} zeroed blocks at {}",
            path.display(),
            nblocks,
            blocknum
        );

        self.register_dirty(reln, fork, skip_fsync);
        Ok(())
    }

    fn prefetch(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<bool> {
        let file = match self.open_fork(reln.rlocator(), fork)? {
            Some(file) => file,
            None => return Ok(false),
        };
        advise_willneed(file, Self::offset(blocknum), Self::offset(nblocks));
        debug!(
            "prefetch {} blocks at {} of {}",
            nblocks,
            blocknum,
            reln.rlocator()
        );
        Ok(true)
    }

    fn max_combine(
        &mut self,
        _reln: &SMgrRelationData,
        _fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> u32 {
        // Never combine past the maximum block number.
        self.io_combine_limit
            .min(INVALID_BLOCK_NUMBER - blocknum.min(INVALID_BLOCK_NUMBER - 1))
    }

    fn readv(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &mut [&mut Block],
    ) -> Result<()> {
        self.validate_range(reln.rlocator(), fork, blocknum, buffers.len() as u32)?;

        let path = self.path(&reln.rlocator(), fork);
        let file = self.file(reln.rlocator(), fork)?;
        for (i, buffer) in buffers.iter_mut().enumerate() {
            let blkno = blocknum + i as BlockNumber;
            file.read_exact_at(&mut buffer[..], Self::offset(blkno))
                .with_context(|| {
                    format!("could not read block {} in file \"{}\"", blkno, path.display())
                })?;
        }
        debug!("read {} blocks at {} from {}", buffers.len(), blocknum, path.display());
        Ok(())
    }

    fn start_readv(
        &mut self,
        ioh: &mut AioHandle,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        self.validate_range(reln.rlocator(), fork, blocknum, nblocks)?;

        let fd = self.file(reln.rlocator(), fork)?.as_raw_fd();
        set_target_smgr(ioh, reln, fork, blocknum, nblocks, false);
        ioh.prepare_readv(Some(fd), Self::offset(blocknum), nblocks);
        Ok(())
    }

    fn writev(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        buffers: &[&Block],
        skip_fsync: bool,
    ) -> Result<()> {
        self.validate_range(reln.rlocator(), fork, blocknum, buffers.len() as u32)?;

        let path = self.path(&reln.rlocator(), fork);
        let file = self.file(reln.rlocator(), fork)?;
        for (i, buffer) in buffers.iter().enumerate() {
            let blkno = blocknum + i as BlockNumber;
            file.write_all_at(&buffer[..], Self::offset(blkno))
                .with_context(|| {
                    format!("could not write block {} in file \"{}\"", blkno, path.display())
                })?;
        }
        debug!("wrote {} blocks at {} to {}", buffers.len(), blocknum, path.display());

        self.register_dirty(reln, fork, skip_fsync);
        Ok(())
    }

    fn writeback(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
        nblocks: u32,
    ) -> Result<()> {
        let path = self.path(&reln.rlocator(), fork);
        // A fork removed in the meantime has nothing left to write back.
        let file = match self.open_fork(reln.rlocator(), fork)? {
            Some(file) => file,
            None => return Ok(()),
        };
        match start_writeback(file, Self::offset(blocknum), Self::offset(nblocks)) {
            Ok(()) => debug!(
                "writeback {} blocks at {} of {}",
                nblocks,
                blocknum,
                path.display()
            ),
            Err(err) => warn!(
                "could not flush dirty data of file \"{}\": {}",
                path.display(),
                err
            ),
        }
        Ok(())
    }

    fn nblocks(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<BlockNumber> {
        self.size(reln.rlocator(), fork)
    }

    fn truncate(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        old_blocks: BlockNumber,
        nblocks: BlockNumber,
        mode: StorageMode,
    ) -> Result<bool> {
        let current = self.size(reln.rlocator(), fork)?;
        if nblocks > current {
            // Replay may truncate a fork that a later record already made
            // smaller; nothing to do then.
            if mode.in_recovery() {
                return Ok(false);
            }
            bail!(Error::TruncateBeyondEnd {
                fork,
                nblocks,
                current,
            });
        }
        if nblocks == current {
            return Ok(true);
        }
        debug_assert!(old_blocks == INVALID_BLOCK_NUMBER || old_blocks >= nblocks);

        let path = self.path(&reln.rlocator(), fork);
        self.file(reln.rlocator(), fork)?
            .set_len(Self::offset(nblocks))
            .with_context(|| {
                format!(
                    "could not truncate file \"{}\" to {} blocks",
                    path.display(),
                    nblocks
                )
            })?;
        debug!("truncated {} from {} to {} blocks", path.display(), current, nblocks);

        self.register_dirty(reln, fork, false);
        Ok(true)
    }

    fn immedsync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()> {
        let path = self.path(&reln.rlocator(), fork);
        self.file(reln.rlocator(), fork)?
            .sync_all()
            .with_context(|| format!("could not fsync file \"{}\"", path.display()))?;
        self.pending_syncs.remove(&(reln.rlocator(), fork));
        Ok(())
    }

    fn registersync(&mut self, reln: &SMgrRelationData, fork: ForkNumber) -> Result<()> {
        self.register_dirty(reln, fork, false);
        Ok(())
    }

    fn sync_pending(&mut self) -> Result<()> {
        // A request is only forgotten once its fork is synced, failed ones are
        // retried at the next checkpoint.
        let pending: Vec<ForkKey> = self.pending_syncs.iter().copied().collect();
        let mut first_err = None;
        for key in pending {
            match self.sync_fork(key) {
                Ok(()) => {
                    self.pending_syncs.remove(&key);
                }
                Err(err) => {
                    warn!("{:#}", err);
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fd(
        &mut self,
        reln: &SMgrRelationData,
        fork: ForkNumber,
        blocknum: BlockNumber,
    ) -> Result<(RawFd, u64)> {
        let fd = self.file(reln.rlocator(), fork)?.as_raw_fd();
        Ok((fd, Self::offset(blocknum)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        relation::{locator::DEFAULTTABLESPACE_OID, RelationLocator},
        storage::smgr::SmgrWhich,
    };

    fn relation(backend: crate::ProcNumber) -> SMgrRelationData {
        let locator = RelationLocator::new(DEFAULTTABLESPACE_OID, 1, 16384);
        SMgrRelationData::new(RelationLocatorBackend::new(locator, backend), SmgrWhich::Md)
    }

    #[test]
    fn test_create_fork_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        md.create(&reln, ForkNumber::VisibilityMap, false)?;
        assert!(dir.path().join("base/1/16384_vm").exists());
        assert_eq!(md.nblocks(&reln, ForkNumber::VisibilityMap)?, 0);

        let err = md
            .create(&reln, ForkNumber::VisibilityMap, false)
            .unwrap_err();
        assert_eq!(
            Error::FileAlreadyExists(dir.path().join("base/1/16384_vm")),
            err.downcast::<Error>().unwrap()
        );
        Ok(())
    }

    #[test]
    fn test_missing_fork() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        assert!(!md.exists(&reln, ForkNumber::Main, StorageMode::Normal)?);
        let err = md.nblocks(&reln, ForkNumber::Main).unwrap_err();
        assert_eq!(
            Error::FileNotFound(dir.path().join("base/1/16384")),
            err.downcast::<Error>().unwrap()
        );

        // Only a warning.
        md.unlink(reln.rlocator(), ForkNumber::Main, false);
        Ok(())
    }

    #[test]
    fn test_close_forks() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        md.create(&reln, ForkNumber::Main, false)?;
        md.create(&reln, ForkNumber::FreeSpaceMap, false)?;
        assert_eq!(md.num_open_files(), 2);

        md.close(&reln, ForkNumber::Main);
        md.close(&reln, ForkNumber::Main);
        assert_eq!(md.num_open_files(), 1);

        // Reopened on demand.
        md.zero_extend(&reln, ForkNumber::Main, 0, 2, true)?;
        assert_eq!(md.num_open_files(), 2);
        assert_eq!(md.nblocks(&reln, ForkNumber::Main)?, 2);
        Ok(())
    }

    #[test]
    fn test_pending_syncs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let shared = relation(crate::INVALID_PROC_NUMBER);
        let temp = relation(4);

        md.create(&shared, ForkNumber::Main, false)?;
        md.create(&temp, ForkNumber::Main, false)?;

        md.extend(&shared, ForkNumber::Main, 0, &ZERO_BLOCK, true)?;
        md.extend(&temp, ForkNumber::Main, 0, &ZERO_BLOCK, false)?;
        assert!(md.pending_syncs.is_empty());

        md.extend(&shared, ForkNumber::Main, 1, &ZERO_BLOCK, false)?;
        assert!(md.pending_syncs.contains(&(shared.rlocator(), ForkNumber::Main)));

        md.sync_pending()?;
        assert!(md.pending_syncs.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_sync_stays_pending() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        md.create(&reln, ForkNumber::Main, false)?;
        md.create(&reln, ForkNumber::FreeSpaceMap, false)?;
        md.extend(&reln, ForkNumber::Main, 0, &ZERO_BLOCK, false)?;
        md.extend(&reln, ForkNumber::FreeSpaceMap, 0, &ZERO_BLOCK, false)?;

        // Swap the fsm file for a directory so it can not be reopened.
        let fsm_path = dir.path().join("base/1/16384_fsm");
        md.close(&reln, ForkNumber::FreeSpaceMap);
        fs::remove_file(&fsm_path)?;
        fs::create_dir(&fsm_path)?;

        assert!(md.sync_pending().is_err());
        let fsm: HashSet<ForkKey> = vec![(reln.rlocator(), ForkNumber::FreeSpaceMap)]
            .into_iter()
            .collect();
        assert_eq!(md.pending_syncs, fsm);

        fs::remove_dir(&fsm_path)?;
        md.sync_pending()?;
        assert!(md.pending_syncs.is_empty());
        Ok(())
    }

    #[test]
    fn test_prefetch_and_writeback() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        assert!(!md.prefetch(&reln, ForkNumber::Main, 0, 4)?);
        md.writeback(&reln, ForkNumber::Main, 0, 4)?;
        assert_eq!(md.num_open_files(), 0);

        md.create(&reln, ForkNumber::Main, false)?;
        md.zero_extend(&reln, ForkNumber::Main, 0, 8, false)?;
        md.close(&reln, ForkNumber::Main);

        // Both reopen the fork.
        assert!(md.prefetch(&reln, ForkNumber::Main, 2, 4)?);
        md.close(&reln, ForkNumber::Main);
        md.writeback(&reln, ForkNumber::Main, 0, 8)?;
        assert_eq!(md.num_open_files(), 1);

        // Writeback does not replace the checkpoint sync.
        assert!(md.pending_syncs.contains(&(reln.rlocator(), ForkNumber::Main)));
        Ok(())
    }

    #[test]
    fn test_truncate() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut md = MdBackend::new(dir.path(), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        md.create(&reln, ForkNumber::Main, false)?;
        md.zero_extend(&reln, ForkNumber::Main, 0, 10, false)?;
        assert!(md.truncate(&reln, ForkNumber::Main, 10, 4, StorageMode::Normal)?);
        assert_eq!(md.nblocks(&reln, ForkNumber::Main)?, 4);
        assert_eq!(
            std::fs::metadata(dir.path().join("base/1/16384"))?.len(),
            4 * BLOCK_SIZE as u64
        );

        let err = md
            .truncate(&reln, ForkNumber::Main, 4, 5, StorageMode::Normal)
            .unwrap_err();
        assert_eq!(
            Error::TruncateBeyondEnd {
                fork: ForkNumber::Main,
                nblocks: 5,
                current: 4,
            },
            err.downcast::<Error>().unwrap()
        );
        assert!(!md.truncate(&reln, ForkNumber::Main, 4, 5, StorageMode::Recovery)?);
        assert_eq!(md.nblocks(&reln, ForkNumber::Main)?, 4);
        Ok(())
    }

    #[test]
    fn test_max_combine() {
        let mut md = MdBackend::new(Path::new("data"), 16);
        let reln = relation(crate::INVALID_PROC_NUMBER);

        assert_eq!(md.max_combine(&reln, ForkNumber::Main, 0), 16);
        assert_eq!(
            md.max_combine(&reln, ForkNumber::Main, INVALID_BLOCK_NUMBER - 3),
            3
        );
    }
}
