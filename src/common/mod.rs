//! Common utilities shared by the harness, the CLI and the mock adapter

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
