use std::path::PathBuf;

use crate::{storage::smgr::SmgrWhich, ProcNumber, INVALID_PROC_NUMBER};

/// Whether the worker is executing normally or replaying the write ahead log.
///
/// Replay may re-apply an action whose effect is already on disk, so a few
/// conditions that are faults in normal execution are tolerated in recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Normal,
    Recovery,
}

impl StorageMode {
    pub fn in_recovery(&self) -> bool {
        *self == StorageMode::Recovery
    }
}

/// Storage manager configuration of a single worker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path where relation files are stored.
    pub data_dir: PathBuf,

    /// Backend used by handles created on this worker.
    pub default_backend: SmgrWhich,

    /// Process number of this worker, owner of its temporary relations.
    pub my_proc_number: ProcNumber,

    /// Maximum number of consecutive blocks that can be merged into a single IO.
    pub io_combine_limit: u32,

    /// Initial capacity of the relation handle registry.
    pub registry_capacity: usize,

    /// Execution mode of the worker.
    pub mode: StorageMode,
}

impl Config {
    /// Create a new default configuration that store files at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_backend: SmgrWhich::Md,
            my_proc_number: INVALID_PROC_NUMBER,
            io_combine_limit: 16,
            registry_capacity: 400,
            mode: StorageMode::Normal,
        }
    }
}
