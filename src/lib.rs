pub mod cli;
pub mod config;
pub mod errors;
pub mod interrupts;
pub mod relation;
pub mod storage;

/// Object identifier.
pub type Oid = u32;

/// An invalid object identifier.
pub const INVALID_OID: Oid = 0;

/// Number of the backend process that owns a session private relation.
pub type ProcNumber = i32;

/// Process number used by relations that are not owned by any backend, in
/// other words, the shared (non temporary) ones.
pub const INVALID_PROC_NUMBER: ProcNumber = -1;
