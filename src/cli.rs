use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tl_core::MediaKind;

#[derive(Parser)]
#[command(name = "travelog")]
#[command(author, version, about = "Media upload processing service for travel logs")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the upload server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single local file like an upload
    Process {
        /// Input file to process (left untouched)
        #[arg(required = true)]
        input: PathBuf,

        /// What to produce
        #[arg(short, long, value_enum, default_value_t = KindArg::Image)]
        kind: KindArg,

        /// Upload root to write into (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Image,
    Avatar,
    Video,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => MediaKind::Image,
            KindArg::Avatar => MediaKind::Avatar,
            KindArg::Video => MediaKind::Video,
        }
    }
}
