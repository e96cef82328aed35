//! Display form of values read from the debugger

use std::fmt;

/// A value and its expanded children, as shown by the debugger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedValue {
    pub name: String,
    pub type_name: Option<String>,
    pub value: String,
    pub children: Vec<RenderedValue>,
}

impl RenderedValue {
    pub fn new(name: impl Into<String>, type_name: Option<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.filter(|t| !t.is_empty()),
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RenderedValue>) -> Self {
        self.children = children;
        self
    }

    /// Node reached by following child indices from this one
    pub(crate) fn descend_mut(&mut self, path: &[usize]) -> Option<&mut RenderedValue> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(f, "{indent}")?;
        if let Some(type_name) = &self.type_name {
            write!(f, "({type_name}) ")?;
        }
        write!(f, "{} = {}", self.name, self.value)?;

        if self.children.is_empty() {
            return Ok(());
        }
        writeln!(f, " {{")?;
        for child in &self.children {
            child.write_tree(f, depth + 1)?;
            writeln!(f)?;
        }
        write!(f, "{indent}}}")
    }
}

impl fmt::Display for RenderedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
