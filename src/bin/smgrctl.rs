use std::env;

use anyhow::Result;
use structopt::StructOpt;
use tinysmgr::{
    cli::{Command, Flags},
    config::{Config, StorageMode},
    storage::{
        aio::AioHandle,
        bufmgr::NoBuffers,
        smgr::{set_target_smgr, AIO_SMGR_TARGET_INFO},
        StorageManager,
    },
};

fn main() -> Result<()> {
    let flags = Flags::from_args();

    stderrlog::new()
        .module(module_path!())
        .module("tinysmgr")
        .quiet(flags.quiet)
        .timestamp(stderrlog::Timestamp::Second)
        .verbosity(flags.verbose)
        .init()?;

    let cwd = env::current_dir()?;
    let mut config = Config::new(cwd.join(&flags.data_dir));
    if flags.recovery {
        config.mode = StorageMode::Recovery;
    }

    let mut smgr = StorageManager::new(config)?;
    run(&mut smgr, &flags.command)?;
    smgr.at_eoxact()?;

    Ok(())
}

fn run(smgr: &mut StorageManager, command: &Command) -> Result<()> {
    let is_redo = smgr.config().mode.in_recovery();
    let rlocator = command.relation().rlocator()?;

    match command {
        Command::Create { rel } => {
            let reln = smgr.open(rlocator)?;
            smgr.create(reln, rel.fork, is_redo)?;
            log::info!("created fork {} of {}", rel.fork, rlocator);
        }
        Command::Exists { rel } => {
            let reln = smgr.open(rlocator)?;
            println!("{}", smgr.exists(reln, rel.fork)?);
        }
        Command::Extend { rel, blocks } => {
            let reln = smgr.open(rlocator)?;
            let nblocks = smgr.nblocks(reln, rel.fork)?;
            smgr.zero_extend(reln, rel.fork, nblocks, *blocks, false)?;
            smgr.immedsync(reln, rel.fork)?;
            println!("{}", nblocks + blocks);
        }
        Command::Nblocks { rel } => {
            let reln = smgr.open(rlocator)?;
            println!("{}", smgr.nblocks(reln, rel.fork)?);
        }
        Command::Truncate { rel, blocks } => {
            let reln = smgr.open(rlocator)?;
            let old_nblocks = smgr.nblocks(reln, rel.fork)?;
            smgr.truncate(&mut NoBuffers, reln, &[rel.fork], &[old_nblocks], &[*blocks])?;
            log::info!(
                "truncated fork {} of {} from {} to {} blocks",
                rel.fork,
                rlocator,
                old_nblocks,
                blocks
            );
        }
        Command::Unlink { rel } => {
            let reln = smgr.open(rlocator)?;
            smgr.unlink_all(&mut NoBuffers, &[reln], is_redo)?;
        }
        Command::Describe { rel, block, blocks } => {
            let reln = smgr.open(rlocator)?;
            let mut ioh = AioHandle::new(smgr.config().my_proc_number);
            set_target_smgr(&mut ioh, smgr.relation(reln)?, rel.fork, *block, *blocks, false);
            if let Some(description) = ioh.describe_target(&AIO_SMGR_TARGET_INFO) {
                println!("{}", description);
            }
        }
    }

    Ok(())
}
