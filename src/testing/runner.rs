//! Test runner implementation
//!
//! Drives one test case end to end: compile, open a debugger session, walk
//! the breakpoints in declared order, render and assert every check, then
//! tear everything down again whatever happened.

use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::session::{DapSession, Debugger, StopEvent};

use super::assertion::assert_contains;
use super::case::TestCase;
use super::driver::Executable;
use super::evaluator::{self, EvalPath};
use super::sequencer::Sequencer;

/// Phase of a test run, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Load,
    Compile,
    SessionInit,
    Target,
    Breakpoint,
    Evaluate,
    Assert,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Load => "load",
            Phase::Compile => "compile",
            Phase::SessionInit => "session-init",
            Phase::Target => "target",
            Phase::Breakpoint => "breakpoint",
            Phase::Evaluate => "evaluate",
            Phase::Assert => "assert",
            Phase::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Options for a test run that do not come from the config file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Adapter name, overrides `defaults.adapter`
    pub adapter: Option<String>,
    /// Directory the executable is built in and the process runs from
    pub work_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Why a test failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub phase: Phase,
    pub message: String,
}

/// Result of a test run
#[derive(Debug)]
pub struct TestReport {
    pub name: String,
    pub passed: bool,
    pub stops_visited: usize,
    pub stops_total: usize,
    pub failure: Option<Failure>,
}

/// How far a run got
#[derive(Debug, Clone, Copy)]
struct Progress {
    phase: Phase,
    stops_visited: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            phase: Phase::Compile,
            stops_visited: 0,
        }
    }
}

impl Progress {
    fn failure(&self, error: &Error) -> Failure {
        Failure {
            phase: error.phase().unwrap_or(self.phase),
            message: error.to_string(),
        }
    }
}

/// Run a test case, returning the first error encountered
pub async fn run_test_case(tc: &TestCase, config: &Config, options: &RunOptions) -> Result<()> {
    let mut progress = Progress::default();
    run(tc, config, options, &mut progress).await
}

async fn run(tc: &TestCase, config: &Config, options: &RunOptions, progress: &mut Progress) -> Result<()> {
    let work_dir = match &options.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    progress.phase = Phase::Compile;
    let exe = Executable::reserve(work_dir.join(tc.exe_name()));
    exe.compile(tc.cc(), &config.compiler.flags, tc.src_file()).await?;

    progress.phase = Phase::SessionInit;
    let mut session = DapSession::open(config, options.adapter.as_deref()).await?;

    run_in_session(&mut session, tc, &exe, &work_dir, progress).await
}

/// Drive an open session and tear it down on every path
async fn run_in_session(
    debugger: &mut dyn Debugger,
    tc: &TestCase,
    exe: &Executable,
    cwd: &Path,
    progress: &mut Progress,
) -> Result<()> {
    let result = drive(debugger, tc, exe.path(), cwd, progress).await;

    let teardown = debugger.shutdown().await;
    exe.remove();

    match (result, teardown) {
        (Err(e), Err(t)) => {
            tracing::warn!("Teardown after failure also failed: {}", t);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(t)) => {
            progress.phase = Phase::Teardown;
            Err(t)
        }
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Load printers, create the target and walk the breakpoints
async fn drive(
    debugger: &mut dyn Debugger,
    tc: &TestCase,
    program: &Path,
    cwd: &Path,
    progress: &mut Progress,
) -> Result<()> {
    progress.phase = Phase::SessionInit;
    debugger
        .load_pretty_printers(tc.pp_script(), tc.load_stmt())
        .await
        .map_err(|e| match e {
            Error::SessionInit(_) => e,
            other => Error::SessionInit(other.to_string()),
        })?;
    tracing::debug!(script = %tc.pp_script().display(), "Pretty printers loaded");

    progress.phase = Phase::Target;
    debugger.create_target(program, cwd).await?;
    tracing::debug!(program = %program.display(), "Target created");

    let breakpoints = tc.breakpoints();
    let mut sequencer = Sequencer::new(breakpoints.iter().map(|bp| bp.line).collect());

    for (i, bp) in breakpoints.iter().enumerate() {
        progress.phase = Phase::Breakpoint;
        let handle = debugger.set_breakpoint(tc.src_file(), bp.line).await?;
        sequencer.register(&handle);
        tracing::debug!(line = bp.line, id = ?handle.id, "Breakpoint set");

        let event = if i == 0 {
            debugger.launch().await?
        } else {
            debugger.resume().await?
        };
        sequencer.on_stop(&event)?;
        progress.stops_visited = sequencer.visited();

        println!(
            "  {} Breakpoint {}/{}: line {} ({})",
            "✓".green(),
            i + 1,
            breakpoints.len(),
            bp.line,
            event.location().dimmed()
        );

        for check in &bp.checks {
            for path in EvalPath::ALL {
                progress.phase = Phase::Evaluate;
                let rendered = evaluator::render(debugger, path, &check.expression).await?;

                progress.phase = Phase::Assert;
                assert_contains(&check.expression, path, &rendered, &check.contains)?;
            }
            println!("    {} {}", "✓".green(), check.expression.dimmed());
        }
    }

    // Let the process run to completion
    progress.phase = Phase::Breakpoint;
    match debugger.resume().await? {
        StopEvent::Exited { exit_code } => {
            tracing::debug!(exit_code, "Process finished");
        }
        stop @ StopEvent::Stopped { .. } => {
            tracing::debug!(location = %stop.location(), "Process stopped again after the last breakpoint");
        }
    }
    Ok(())
}

/// Load a YAML test case and run it, printing progress
pub async fn run_scenario(path: &Path, config: &Config, options: &RunOptions) -> TestReport {
    let tc = match TestCase::load(path, &config.compiler.command) {
        Ok(tc) => tc,
        Err(e) => {
            let name = path.display().to_string();
            println!("\n{} {}", "Loading Test:".blue().bold(), name.white().bold());
            println!("  {} {}", "✗".red(), e);
            return TestReport {
                name,
                passed: false,
                stops_visited: 0,
                stops_total: 0,
                failure: Some(Failure {
                    phase: Phase::Load,
                    message: e.to_string(),
                }),
            };
        }
    };

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        tc.name().white().bold()
    );
    if options.verbose {
        println!("  Source: {}", tc.src_file().display().to_string().dimmed());
        println!("  Printers: {}", tc.pp_script().display().to_string().dimmed());
    }

    let mut progress = Progress::default();
    let result = run(&tc, config, options, &mut progress).await;
    report(&tc, &progress, result)
}

fn report(tc: &TestCase, progress: &Progress, result: Result<()>) -> TestReport {
    let stops_total = tc.breakpoints().len();
    match result {
        Ok(()) => {
            println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());
            TestReport {
                name: tc.name().to_string(),
                passed: true,
                stops_visited: progress.stops_visited,
                stops_total,
                failure: None,
            }
        }
        Err(e) => {
            let failure = progress.failure(&e);
            println!(
                "  {} [{}] {}",
                "✗".red(),
                failure.phase.to_string().yellow(),
                failure.message
            );
            println!("\n{} {}\n", "✗".red().bold(), "Test Failed".red().bold());
            TestReport {
                name: tc.name().to_string(),
                passed: false,
                stops_visited: progress.stops_visited,
                stops_total,
                failure: Some(failure),
            }
        }
    }
}

/// Print a one-line summary per report and the totals
pub fn print_summary(reports: &[TestReport]) {
    if reports.len() < 2 {
        return;
    }
    println!("{}", "Summary:".cyan());
    for r in reports {
        let mark = if r.passed { "✓".green() } else { "✗".red() };
        println!(
            "  {} {} ({}/{} stops)",
            mark, r.name, r.stops_visited, r.stops_total
        );
    }
    let passed = reports.iter().filter(|r| r.passed).count();
    println!(
        "\n{} passed, {} failed\n",
        passed.to_string().green(),
        (reports.len() - passed).to_string().red()
    );
}
