//! pptest - A test harness for debugger pretty printers
//!
//! This library drives debug adapters through the Debug Adapter Protocol
//! (DAP) to check that pretty printers render values as expected, and
//! models how a debugger indexes values.

pub mod cli;
pub mod commands;
pub mod common;
pub mod dap;
pub mod oracle;
pub mod session;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use session::{DapSession, Debugger, RenderedValue, StopEvent};
pub use testing::{run_test_case, TestCase};
