use std::fmt;

/// Each relation is stored on a set of physical files called forks. The main
/// fork holds the actual data and the others hold auxiliary information about
/// it. Every fork is created, sized and truncated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForkNumber {
    Main = 0,
    FreeSpaceMap = 1,
    VisibilityMap = 2,
    Init = 3,
}

/// Highest fork number, used to size per fork arrays.
pub const MAX_FORKNUM: ForkNumber = ForkNumber::Init;

/// Number of forks that a relation can have.
pub const NUM_FORKS: usize = MAX_FORKNUM as usize + 1;

impl ForkNumber {
    /// All forks, ordered by fork number.
    pub const ALL: [ForkNumber; NUM_FORKS] = [
        ForkNumber::Main,
        ForkNumber::FreeSpaceMap,
        ForkNumber::VisibilityMap,
        ForkNumber::Init,
    ];

    /// Return the fork name used as file name suffix. The main fork has no
    /// suffix on disk but is still called "main".
    pub fn name(&self) -> &'static str {
        match self {
            ForkNumber::Main => "main",
            ForkNumber::FreeSpaceMap => "fsm",
            ForkNumber::VisibilityMap => "vm",
            ForkNumber::Init => "init",
        }
    }

    /// Parse a fork from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|fork| fork.name() == name)
    }

    /// Index of this fork inside per fork arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ForkNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
