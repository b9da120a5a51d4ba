use structopt::StructOpt;

use crate::{
    relation::{ForkNumber, RelationLocator, RelationLocatorBackend},
    storage::BlockNumber,
    Oid,
};

/// Command line arguments
#[derive(StructOpt)]
#[structopt(about = "Inspect and change relation files")]
pub struct Flags {
    /// Silence all output
    #[structopt(short = "q", long = "quiet")]
    pub quiet: bool,

    /// Path where relation files are stored.
    #[structopt(long = "data-dir", default_value = "data")]
    pub data_dir: String,

    /// Verbose mode (-v, -vv, -vvv, etc)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    pub verbose: usize,

    /// Tolerate the conditions that replaying the write ahead log tolerates.
    #[structopt(long = "recovery")]
    pub recovery: bool,

    #[structopt(subcommand)]
    pub command: Command,
}

/// Relation fork selected on the command line.
#[derive(StructOpt, Debug)]
pub struct RelationArgs {
    /// Tablespace oid.
    #[structopt(long = "tablespace", default_value = "1663")]
    pub tablespace: Oid,

    /// Database oid.
    #[structopt(long = "database")]
    pub database: Oid,

    /// Relation file number.
    #[structopt(long = "relation")]
    pub relation: Oid,

    /// Fork name: main, fsm, vm or init.
    #[structopt(long = "fork", default_value = "main", parse(try_from_str = parse_fork))]
    pub fork: ForkNumber,
}

impl RelationArgs {
    pub fn rlocator(&self) -> anyhow::Result<RelationLocatorBackend> {
        let rlocator = RelationLocatorBackend::shared(RelationLocator::new(
            self.tablespace,
            self.database,
            self.relation,
        ));
        rlocator.validate()?;
        Ok(rlocator)
    }
}

fn parse_fork(name: &str) -> Result<ForkNumber, String> {
    ForkNumber::from_name(name).ok_or_else(|| format!("invalid fork name: {}", name))
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Create a relation fork.
    Create {
        #[structopt(flatten)]
        rel: RelationArgs,
    },

    /// Tell whether a relation fork exists.
    Exists {
        #[structopt(flatten)]
        rel: RelationArgs,
    },

    /// Append zeroed blocks to a relation fork.
    Extend {
        #[structopt(flatten)]
        rel: RelationArgs,

        /// Number of blocks to add.
        #[structopt(long = "blocks", default_value = "1")]
        blocks: u32,
    },

    /// Print the number of blocks of a relation fork.
    Nblocks {
        #[structopt(flatten)]
        rel: RelationArgs,
    },

    /// Truncate a relation fork.
    Truncate {
        #[structopt(flatten)]
        rel: RelationArgs,

        /// New size in blocks.
        #[structopt(long = "blocks")]
        blocks: BlockNumber,
    },

    /// Remove every fork of a relation.
    Unlink {
        #[structopt(flatten)]
        rel: RelationArgs,
    },

    /// Describe a block range of a relation fork the way IO errors do.
    Describe {
        #[structopt(flatten)]
        rel: RelationArgs,

        /// First block.
        #[structopt(long = "block", default_value = "0")]
        block: BlockNumber,

        /// Number of blocks.
        #[structopt(long = "blocks", default_value = "1")]
        blocks: u32,
    },
}

impl Command {
    pub fn relation(&self) -> &RelationArgs {
        match self {
            Command::Create { rel }
            | Command::Exists { rel }
            | Command::Extend { rel, .. }
            | Command::Nblocks { rel }
            | Command::Truncate { rel, .. }
            | Command::Unlink { rel }
            | Command::Describe { rel, .. } => rel,
        }
    }
}
