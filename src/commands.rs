//! CLI command definitions
//!
//! Defines the clap commands for the pptest CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run pretty-printer test cases
    Run {
        /// Paths to YAML test case files
        #[arg(required = true)]
        cases: Vec<PathBuf>,

        /// Debug adapter to use (default from config, else lldb-dap)
        #[arg(long)]
        adapter: Option<String>,

        /// Directory to build the test programs in (default: current directory)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Configuration file (default: platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Write a full trace, including DAP traffic, to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Print the breakpoint plan of a test case without running it
    Show {
        /// Path to the YAML test case file
        case: PathBuf,
    },
}
