//! Debug Adapter Protocol (DAP) implementation
//!
//! Client side of DAP, used to drive debug adapters such as lldb-dap
//! or `gdb -i dap`.

pub mod client;
pub mod codec;
pub mod types;

pub use client::DapClient;
pub use types::*;
