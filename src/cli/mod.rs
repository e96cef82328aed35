//! CLI command handling
//!
//! Dispatches CLI commands to the test runner and formats output.

use std::path::Path;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{self, RunOptions, TestCase};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            cases,
            adapter,
            work_dir,
            config,
            verbose,
            log_file: _,
        } => {
            let config = load_config(config.as_deref())?;
            let options = RunOptions {
                adapter,
                work_dir,
                verbose,
            };

            let mut reports = Vec::with_capacity(cases.len());
            for case in &cases {
                reports.push(testing::run_scenario(case, &config, &options).await);
            }
            testing::print_summary(&reports);

            let failed = reports.iter().filter(|r| !r.passed).count();
            if failed > 0 {
                return Err(Error::Internal(format!(
                    "{} of {} test case(s) failed",
                    failed,
                    reports.len()
                )));
            }
            Ok(())
        }

        Commands::Show { case } => {
            let config = Config::load()?;
            let tc = TestCase::load(&case, &config.compiler.command)?;
            print_plan(&tc);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
}

fn print_plan(tc: &TestCase) {
    println!("{} {}", "Test:".blue().bold(), tc.name().white().bold());
    println!("  Source:   {}", tc.src_file().display());
    println!("  Compiler: {}", tc.cc());
    println!("  Printers: {} ({})", tc.pp_script().display(), tc.load_stmt().dimmed());
    println!("  Executable: {}", tc.exe_name());

    println!("\n{}", "Breakpoints:".cyan());
    for (i, bp) in tc.breakpoints().iter().enumerate() {
        println!("  {}. line {}", i + 1, bp.line);
        for check in &bp.checks {
            let expected = check
                .contains
                .iter()
                .map(|s| format!("{s:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("     {} contains {}", check.expression.yellow(), expected);
        }
    }
}
