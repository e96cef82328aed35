//! pptest - pretty-printer test harness
//!
//! Compiles small test programs, runs them under a debugger through the
//! Debug Adapter Protocol and checks how values render at each breakpoint.

use clap::Parser;
use commands::Commands;
use pptest::common::logging;
use pptest::{cli, commands};

#[derive(Parser)]
#[command(name = "pptest", about = "Debugger pretty-printer test harness")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let (verbose, log_file) = match &cli.command {
        Commands::Run {
            verbose, log_file, ..
        } => (*verbose, log_file.clone()),
        Commands::Show { .. } => (false, None),
    };
    let guard = logging::init_cli(verbose, log_file.as_deref());

    let result = cli::dispatch(cli.command).await;
    drop(guard);

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
