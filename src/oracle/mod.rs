//! Indexing oracle
//!
//! A self-contained model of how a debugger answers `value[key]`: typed
//! values over a sparse memory image, with the same results and error
//! messages a debugger gives for each combination of target and key.

mod index;
mod memory;
mod types;
mod value;

use thiserror::Error;

pub use index::{index, IndexKey};
pub use memory::Memory;
pub use types::{Aggregate, Field, ScalarKind, ScalarType, StructBuilder, StructType, Type, POINTER_SIZE};
pub use value::{Location, Value};

/// Uniform evaluation error; kinds are told apart by message only
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn inaccessible(addr: u64) -> Self {
        Self::new(format!("Cannot access memory at address 0x{addr:x}"))
    }

    pub(crate) fn not_a_number() -> Self {
        Self::new("Argument to arithmetic operation not a number or boolean.")
    }
}
