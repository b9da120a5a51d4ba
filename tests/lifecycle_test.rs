mod common;

use anyhow::Result;
use common::rlocator;
use rand::Rng;
use tinysmgr::{
    config::{Config, StorageMode},
    errors,
    relation::{ForkNumber, RelationLocatorBackend},
    storage::{bufmgr::NoBuffers, Error, StorageManager, BLOCK_SIZE, INVALID_BLOCK_NUMBER},
};

#[test]
fn test_handle_lifecycle_across_transactions() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut smgr = StorageManager::new(Config::new(dir.path()))?;

    let mut block = [0; BLOCK_SIZE];
    rand::thread_rng().fill(&mut block[..]);

    let rel = rlocator(1, 16384);
    let reln = smgr.open(rel)?;
    smgr.create(reln, ForkNumber::Main, false)?;
    smgr.pin(reln)?;
    smgr.extend(reln, ForkNumber::Main, 0, &block, false)?;
    assert_eq!(smgr.nblocks(reln, ForkNumber::Main)?, 1);

    // Pinned handles survive the end of the transaction.
    smgr.at_eoxact()?;
    assert!(smgr.contains(&rel));

    smgr.unpin(reln)?;
    smgr.at_eoxact()?;
    assert!(!smgr.contains(&rel));
    assert_eq!(smgr.num_relations(), 0);
    assert_eq!(
        errors::Error::StaleHandle,
        smgr.nblocks(reln, ForkNumber::Main)
            .unwrap_err()
            .downcast::<errors::Error>()
            .unwrap()
    );

    let reopened = smgr.open(rel)?;
    assert_ne!(reopened, reln);
    assert_eq!(smgr.relation(reopened)?.pincount(), 0);
    assert_eq!(
        smgr.relation(reopened)?.cached_nblocks(ForkNumber::Main),
        INVALID_BLOCK_NUMBER
    );
    assert_eq!(smgr.nblocks(reopened, ForkNumber::Main)?, 1);

    let mut read = [0; BLOCK_SIZE];
    smgr.read(reopened, ForkNumber::Main, 0, &mut read)?;
    assert_eq!(read[..], block[..]);
    Ok(())
}

#[test]
fn test_release_all_closes_pinned() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut smgr = StorageManager::new(Config::new(dir.path()))?;

    let reln = smgr.open(rlocator(1, 16384))?;
    smgr.create(reln, ForkNumber::Main, false)?;
    smgr.pin(reln)?;
    smgr.zero_extend(reln, ForkNumber::Main, 0, 4, false)?;
    smgr.nblocks(reln, ForkNumber::Main)?;

    smgr.release_all()?;

    assert_eq!(smgr.relation(reln)?.pincount(), 1);
    assert_eq!(
        smgr.relation(reln)?.cached_nblocks(ForkNumber::Main),
        INVALID_BLOCK_NUMBER
    );
    assert_eq!(smgr.nblocks(reln, ForkNumber::Main)?, 4);
    Ok(())
}

#[test]
fn test_redo_create_tolerates_existing_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rel = rlocator(1, 16384);

    {
        let mut smgr = StorageManager::new(Config::new(dir.path()))?;
        let reln = smgr.open(rel)?;
        smgr.create(reln, ForkNumber::Main, false)?;
        smgr.zero_extend(reln, ForkNumber::Main, 0, 2, false)?;
    }

    let mut smgr = StorageManager::new(Config::new(dir.path()))?;
    smgr.set_mode(StorageMode::Recovery);
    let reln = smgr.open(rel)?;

    smgr.create(reln, ForkNumber::Main, true)?;
    assert!(smgr.exists(reln, ForkNumber::Main)?);
    assert_eq!(smgr.nblocks(reln, ForkNumber::Main)?, 2);

    let err = smgr.create(reln, ForkNumber::Main, false).unwrap_err();
    assert_eq!(
        Error::FileAlreadyExists(dir.path().join("base/1/16384")),
        err.downcast::<Error>().unwrap()
    );
    Ok(())
}

#[test]
fn test_recovery_tolerates_replayed_truncate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut smgr = StorageManager::new(Config::new(dir.path()))?;

    let reln = smgr.open(rlocator(1, 16384))?;
    smgr.create(reln, ForkNumber::Main, false)?;
    smgr.zero_extend(reln, ForkNumber::Main, 0, 2, false)?;

    smgr.set_mode(StorageMode::Recovery);
    smgr.truncate(&mut NoBuffers, reln, &[ForkNumber::Main], &[8], &[6])?;
    // The fork was not grown, so its size is unknown until asked again.
    assert_eq!(
        smgr.nblocks_cached(reln, ForkNumber::Main)?,
        INVALID_BLOCK_NUMBER
    );
    assert_eq!(smgr.nblocks(reln, ForkNumber::Main)?, 2);
    assert_eq!(smgr.nblocks_cached(reln, ForkNumber::Main)?, 2);

    // Files removed by a later record are not reported while replaying.
    smgr.unlink_all(&mut NoBuffers, &[reln], true)?;
    smgr.unlink_all(&mut NoBuffers, &[reln], true)?;
    assert!(!smgr.exists(reln, ForkNumber::Main)?);
    Ok(())
}

#[test]
fn test_temp_relation_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut smgr = StorageManager::new(Config::new(dir.path()))?;

    let shared = rlocator(1, 16384);
    let temp = RelationLocatorBackend::new(shared.locator, 7);
    let shared_reln = smgr.open(shared)?;
    let temp_reln = smgr.open(temp)?;
    assert_ne!(shared_reln, temp_reln);
    assert!(smgr.relation(temp_reln)?.is_temp());

    smgr.create(temp_reln, ForkNumber::Main, false)?;
    smgr.zero_extend(temp_reln, ForkNumber::Main, 0, 1, false)?;

    assert!(dir.path().join("base/1/t7_16384").exists());
    assert!(!smgr.exists(shared_reln, ForkNumber::Main)?);
    Ok(())
}

#[test]
fn test_write_and_sync() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut smgr = StorageManager::new(Config::new(dir.path()))?;
    let mut rng = rand::thread_rng();

    let reln = smgr.open(rlocator(1, 16384))?;
    smgr.create(reln, ForkNumber::Main, false)?;
    smgr.zero_extend(reln, ForkNumber::Main, 0, 8, false)?;

    let mut blocks = vec![[0; BLOCK_SIZE]; 3];
    for block in blocks.iter_mut() {
        rng.fill(&mut block[..]);
    }
    let buffers: Vec<&[u8; BLOCK_SIZE]> = blocks.iter().collect();
    smgr.writev(reln, ForkNumber::Main, 2, &buffers, false)?;
    smgr.writeback(reln, ForkNumber::Main, 2, 3)?;
    smgr.register_sync(reln, ForkNumber::Main)?;
    smgr.sync_pending()?;

    assert!(smgr.prefetch(reln, ForkNumber::Main, 2, 3)?);
    assert!(!smgr.prefetch(reln, ForkNumber::FreeSpaceMap, 0, 1)?);
    assert_eq!(smgr.max_combine(reln, ForkNumber::Main, 2)?, 16);

    let mut read = vec![[0; BLOCK_SIZE]; 3];
    {
        let mut buffers: Vec<&mut [u8; BLOCK_SIZE]> = read.iter_mut().collect();
        smgr.readv(reln, ForkNumber::Main, 2, &mut buffers)?;
    }
    assert!(read.iter().zip(blocks.iter()).all(|(r, b)| r[..] == b[..]));

    let err = smgr
        .write(reln, ForkNumber::Main, 8, &blocks[0], false)
        .unwrap_err();
    assert_eq!(
        Error::BlockOutOfRange {
            fork: ForkNumber::Main,
            first: 8,
            last: 8,
            nblocks: 8,
        },
        err.downcast::<Error>().unwrap()
    );
    Ok(())
}
