use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Oid, ProcNumber, INVALID_OID, INVALID_PROC_NUMBER};

use super::fork::ForkNumber;

/// Default tablespace oid to store per database relation files.
pub const DEFAULTTABLESPACE_OID: Oid = 1663;

/// Global tablespace oid to store global database relation files, such as pg_database and
/// pg_tablespace.
pub const GLOBALTABLESPACE_OID: Oid = 1664;

/// RelationLocator provide all that we need to know to physically access a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationLocator {
    /// Tablespace oid where relation is stored.
    pub tablespace: Oid,

    /// Database oid that this relation belongs.
    pub database: Oid,

    /// Relation file number.
    pub oid: Oid,
}

impl RelationLocator {
    pub fn new(tablespace: Oid, database: Oid, oid: Oid) -> Self {
        Self {
            tablespace,
            database,
            oid,
        }
    }
}

/// A relation locator augmented with the process number of the backend that
/// owns it. Shared relations use [INVALID_PROC_NUMBER], temporary relations
/// use the number of their owning backend.
///
/// This is the key of the storage manager handle registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationLocatorBackend {
    pub locator: RelationLocator,
    pub backend: ProcNumber,
}

impl RelationLocatorBackend {
    pub fn new(locator: RelationLocator, backend: ProcNumber) -> Self {
        Self { locator, backend }
    }

    /// Locator of a shared, non temporary, relation.
    pub fn shared(locator: RelationLocator) -> Self {
        Self::new(locator, INVALID_PROC_NUMBER)
    }

    /// Return true if the relation is private to a single backend.
    pub fn is_temp(&self) -> bool {
        self.backend != INVALID_PROC_NUMBER
    }

    /// Check that the locator names a relation file. Shared system relations
    /// of the global tablespace are never temporary; every other relation
    /// belongs to a database.
    pub fn validate(&self) -> Result<(), Error> {
        let locator = &self.locator;
        let valid = locator.tablespace != INVALID_OID
            && locator.oid != INVALID_OID
            && match locator.tablespace {
                GLOBALTABLESPACE_OID => !self.is_temp(),
                _ => locator.database != INVALID_OID,
            };
        if !valid {
            return Err(Error::InvalidLocator(*self));
        }
        Ok(())
    }

    /// Return the path of a fork relative to the data directory.
    pub fn path(&self, fork: ForkNumber) -> PathBuf {
        relation_path(&self.locator, self.backend, fork)
    }
}

impl fmt::Display for RelationLocatorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path(ForkNumber::Main).display())
    }
}

/// Return the physical path of a relation fork, relative to the data directory.
///
/// Panics on a locator that does not pass [RelationLocatorBackend::validate].
pub fn relation_path(locator: &RelationLocator, backend: ProcNumber, fork: ForkNumber) -> PathBuf {
    assert_ne!(locator.tablespace, INVALID_OID);
    assert_ne!(locator.oid, INVALID_OID);

    let file_name = match backend {
        INVALID_PROC_NUMBER => locator.oid.to_string(),
        backend => format!("t{}_{}", backend, locator.oid),
    };
    let file_name = match fork {
        ForkNumber::Main => file_name,
        fork => format!("{}_{}", file_name, fork.name()),
    };

    match locator.tablespace {
        GLOBALTABLESPACE_OID => {
            // Shared system relations live in the global directory and are
            // never temporary.
            assert_eq!(backend, INVALID_PROC_NUMBER);
            Path::new("global").join(file_name)
        }
        DEFAULTTABLESPACE_OID => {
            assert_ne!(locator.database, INVALID_OID);
            Path::new("base")
                .join(locator.database.to_string())
                .join(file_name)
        }
        tablespace => Path::new("pg_tblspc")
            .join(tablespace.to_string())
            .join(locator.database.to_string())
            .join(file_name),
    }
}
