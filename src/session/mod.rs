//! Debugger session surface
//!
//! The harness only talks to a debugger through the [`Debugger`] trait.
//! [`DapSession`] implements it on top of a DAP adapter; tests substitute
//! scripted implementations.

mod dap;
mod render;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::common::Result;

pub use dap::DapSession;
pub use render::RenderedValue;

/// A breakpoint as acknowledged by the debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointHandle {
    /// Debugger-assigned id, reported again when the breakpoint fires
    pub id: Option<u32>,
    /// Line the breakpoint was requested at
    pub requested_line: u32,
    /// Line the debugger resolved it to
    pub line: Option<u32>,
    pub verified: bool,
}

/// Innermost frame of the thread that stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLocation {
    pub frame_id: i64,
    pub function: String,
    pub file: Option<String>,
    pub line: u32,
}

impl fmt::Display for FrameLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} ({}:{})", self.function, file, self.line),
            None => write!(f, "{} (line {})", self.function, self.line),
        }
    }
}

/// What the process did after a launch or resume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// Process is stopped and can be inspected
    Stopped {
        reason: String,
        thread_id: Option<i64>,
        hit_breakpoint_ids: Vec<u32>,
        frame: Option<FrameLocation>,
    },
    /// Process ran to completion
    Exited { exit_code: i32 },
}

impl StopEvent {
    /// Human-readable location of the stop
    pub fn location(&self) -> String {
        match self {
            StopEvent::Stopped {
                frame: Some(frame), ..
            } => frame.to_string(),
            StopEvent::Stopped { .. } => "unknown location".to_string(),
            StopEvent::Exited { exit_code } => format!("exit (code {exit_code})"),
        }
    }
}

/// Debugger control surface consumed by the harness
///
/// `launch` and `resume` are blocking from the caller's view: they return
/// only once the debugger reports the process stopped or exited.
#[async_trait]
pub trait Debugger: Send {
    /// Load a pretty-printer script and run the statement that registers it
    async fn load_pretty_printers(&mut self, script: &Path, load_stmt: &str) -> Result<()>;

    /// Bind the session to an executable
    async fn create_target(&mut self, program: &Path, cwd: &Path) -> Result<()>;

    /// Create a line breakpoint
    async fn set_breakpoint(&mut self, file: &Path, line: u32) -> Result<BreakpointHandle>;

    /// Start the process without arguments and wait for it to stop
    async fn launch(&mut self) -> Result<StopEvent>;

    /// Continue the stopped process and wait for it to stop again
    async fn resume(&mut self) -> Result<StopEvent>;

    /// Evaluate free-standing expression text
    async fn evaluate(&mut self, expression: &str) -> Result<RenderedValue>;

    /// Look up a variable in the selected frame of the selected thread
    async fn frame_variable(&mut self, name: &str) -> Result<RenderedValue>;

    /// End the session, killing the process; safe to call more than once
    async fn shutdown(&mut self) -> Result<()>;
}
