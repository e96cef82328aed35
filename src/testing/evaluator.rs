//! Expression evaluator
//!
//! Every check is rendered two independent ways: as a free-standing
//! expression and as a variable looked up in the selected frame. Pretty
//! printers have to work for both.

use std::fmt;

use crate::common::{Error, Result};
use crate::session::{Debugger, RenderedValue};

/// Which debugger facility produced a rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalPath {
    /// Free-standing expression evaluation
    Expression,
    /// Variable lookup in the selected frame of the selected thread
    FrameVariable,
}

impl EvalPath {
    pub const ALL: [EvalPath; 2] = [EvalPath::Expression, EvalPath::FrameVariable];
}

impl fmt::Display for EvalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalPath::Expression => write!(f, "expression"),
            EvalPath::FrameVariable => write!(f, "frame variable"),
        }
    }
}

/// Render `expression` through one path, requiring a valid result
pub async fn render(debugger: &mut dyn Debugger, path: EvalPath, expression: &str) -> Result<String> {
    let value = match path {
        EvalPath::Expression => debugger.evaluate(expression).await?,
        EvalPath::FrameVariable => debugger.frame_variable(expression).await?,
    };

    if is_empty(&value) {
        return Err(Error::evaluation(path, expression, "debugger returned an empty value"));
    }

    let text = value.to_string();
    tracing::debug!(%path, expression, "Rendered value:\n{}", text);
    Ok(text)
}

fn is_empty(value: &RenderedValue) -> bool {
    value.value.trim().is_empty() && value.children.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        assert_eq!(EvalPath::Expression.to_string(), "expression");
        assert_eq!(EvalPath::FrameVariable.to_string(), "frame variable");
    }

    #[test]
    fn test_empty_value_detection() {
        assert!(is_empty(&RenderedValue::new("v", None, " ")));
        assert!(!is_empty(&RenderedValue::new("v", None, "0")));
        let with_children = RenderedValue::new("v", None, "")
            .with_children(vec![RenderedValue::new("a", None, "1")]);
        assert!(!is_empty(&with_children));
    }
}
