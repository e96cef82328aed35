//! Error types for the pretty-printer harness
//!
//! Setup errors name the phase that failed, assertion failures carry the
//! expression, the missing substring and the full rendering.

use std::io;
use thiserror::Error;

use crate::testing::{AssertionFailure, EvalPath, Phase};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Driver Errors ===
    #[error("Compiling source file '{source_file}' failed ({status}){}", fmt_stderr(.stderr))]
    Compilation {
        source_file: String,
        status: String,
        stderr: String,
    },

    // === Session Errors ===
    #[error("Debugger session could not be initialized: {0}")]
    SessionInit(String),

    #[error("Target for '{program}' could not be created: {reason}")]
    TargetCreation { program: String, reason: String },

    // === Adapter Errors ===
    #[error("Debug adapter '{name}' not found. Searched: {searched}")]
    AdapterNotFound { name: String, searched: String },

    #[error("Debug adapter failed to start: {0}")]
    AdapterStartFailed(String),

    #[error("Debug adapter crashed unexpectedly")]
    AdapterCrashed,

    // === DAP Protocol Errors ===
    #[error("DAP protocol error: {0}")]
    DapProtocol(String),

    #[error("DAP request '{command}' failed: {message}")]
    DapRequestFailed { command: String, message: String },

    // === Breakpoint Sequencing Errors ===
    #[error("Failed to set breakpoint at {location}: {reason}")]
    BreakpointFailed { location: String, reason: String },

    #[error("Expected to stop at line {expected}, but breakpoint at line {actual} fired first")]
    OutOfOrderStop { expected: u32, actual: u32 },

    #[error("Expected to stop at line {expected}, but process stopped ({reason}) at {location}")]
    UnexpectedStop {
        expected: u32,
        reason: String,
        location: String,
    },

    #[error("Expected to stop at line {expected}, but process exited with code {exit_code}")]
    UnexpectedExit { expected: u32, exit_code: i32 },

    #[error("Cannot {action} while process is {state}")]
    InvalidState { action: String, state: String },

    // === Evaluation Errors ===
    #[error("{path} '{expression}' did not produce a valid value: {message}")]
    Evaluation {
        path: EvalPath,
        expression: String,
        message: String,
    },

    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    // === Timeout Errors ===
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid test case: {0}")]
    InvalidTestCase(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

impl Error {
    /// Create an adapter not found error with search paths
    pub fn adapter_not_found<S: AsRef<str>>(name: &str, paths: &[S]) -> Self {
        Self::AdapterNotFound {
            name: name.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a DAP request failed error
    pub fn dap_request_failed(command: &str, message: &str) -> Self {
        Self::DapRequestFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a breakpoint failed error
    pub fn breakpoint_failed(location: &str, reason: &str) -> Self {
        Self::BreakpointFailed {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an evaluation error for one of the two rendering paths
    pub fn evaluation(path: EvalPath, expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            path,
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    /// The phase of a test run this error belongs to
    ///
    /// Adapter, protocol and IO errors can happen in any phase and return `None`.
    pub fn phase(&self) -> Option<Phase> {
        let phase = match self {
            Error::Compilation { .. } => Phase::Compile,
            Error::SessionInit(_)
            | Error::AdapterNotFound { .. }
            | Error::AdapterStartFailed(_) => Phase::SessionInit,
            Error::TargetCreation { .. } => Phase::Target,
            Error::BreakpointFailed { .. }
            | Error::OutOfOrderStop { .. }
            | Error::UnexpectedStop { .. }
            | Error::UnexpectedExit { .. }
            | Error::InvalidState { .. } => Phase::Breakpoint,
            Error::Evaluation { .. } => Phase::Evaluate,
            Error::Assertion(_) => Phase::Assert,
            Error::Config(_)
            | Error::ConfigParse(_)
            | Error::InvalidTestCase(_)
            | Error::FileRead { .. } => Phase::Load,
            _ => return None,
        };
        Some(phase)
    }
}
