//! Pretty-printer test harness
//!
//! Reads test cases, compiles the test program and checks that values
//! render with the expected substrings at each breakpoint, through both
//! expression evaluation and frame variable lookup.

mod assertion;
mod case;
mod driver;
mod evaluator;
mod runner;
mod sequencer;

pub use assertion::{assert_contains, AssertionFailure};
pub use case::{BreakpointSpec, ExpressionCheck, PrettyPrinterSpec, TestCase, TestCaseFile};
pub use driver::Executable;
pub use evaluator::EvalPath;
pub use runner::{
    print_summary, run_scenario, run_test_case, Failure, Phase, RunOptions, TestReport,
};
pub use sequencer::Sequencer;
