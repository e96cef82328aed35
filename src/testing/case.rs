//! Test case definitions
//!
//! A test case is written as YAML and validated into an immutable
//! [`TestCase`] before anything is compiled or launched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::paths::resolve_relative;
use crate::common::{Error, Result};

/// An expression to evaluate at a stop and the substrings its rendering must contain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpressionCheck {
    /// Expression text, also looked up as a frame variable
    pub expression: String,
    /// Substrings that must all appear in the rendered value
    pub contains: Vec<String>,
}

impl ExpressionCheck {
    pub fn new<S: Into<String>>(expression: impl Into<String>, contains: impl IntoIterator<Item = S>) -> Self {
        Self {
            expression: expression.into(),
            contains: contains.into_iter().map(Into::into).collect(),
        }
    }
}

/// A breakpoint line and the checks run when it is hit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakpointSpec {
    pub line: u32,
    #[serde(default)]
    pub checks: Vec<ExpressionCheck>,
}

/// Pretty-printer script and the statement that registers it
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrettyPrinterSpec {
    pub script: PathBuf,
    pub load: String,
}

/// Test case as written in a YAML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCaseFile {
    pub name: String,
    pub source: PathBuf,
    /// Compiler command, defaults to the configured compiler
    #[serde(default)]
    pub compiler: Option<String>,
    pub pretty_printers: PrettyPrinterSpec,
    pub breakpoints: Vec<BreakpointSpec>,
}

/// A validated pretty-printer test case
///
/// Breakpoints are kept in declared order, which is also the order the
/// process is expected to hit them.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    src_file: PathBuf,
    cc: String,
    pp_script: PathBuf,
    load_stmt: String,
    breakpoints: Vec<BreakpointSpec>,
}

impl TestCase {
    /// Build and validate a test case
    pub fn new(
        name: impl Into<String>,
        src_file: impl Into<PathBuf>,
        cc: impl Into<String>,
        pp_script: impl Into<PathBuf>,
        load_stmt: impl Into<String>,
        breakpoints: Vec<BreakpointSpec>,
    ) -> Result<Self> {
        let tc = Self {
            name: name.into(),
            src_file: src_file.into(),
            cc: cc.into(),
            pp_script: pp_script.into(),
            load_stmt: load_stmt.into(),
            breakpoints,
        };
        tc.validate()?;
        Ok(tc)
    }

    /// Load a test case from a YAML file
    ///
    /// Relative paths are resolved against the file's directory.
    pub fn load(path: &Path, default_cc: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let file: TestCaseFile = serde_yaml::from_str(&content).map_err(|e| {
            Error::InvalidTestCase(format!("{}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_file(file, base, default_cc)
    }

    /// Validate a parsed YAML test case
    pub fn from_file(file: TestCaseFile, base: &Path, default_cc: &str) -> Result<Self> {
        Self::new(
            file.name,
            resolve_relative(base, &file.source),
            file.compiler.unwrap_or_else(|| default_cc.to_string()),
            resolve_relative(base, &file.pretty_printers.script),
            file.pretty_printers.load,
            file.breakpoints,
        )
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidTestCase(format!("'{}': {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(Error::InvalidTestCase("test case has no name".to_string()));
        }
        if self.cc.trim().is_empty() {
            return invalid("compiler command is empty".to_string());
        }
        if self.load_stmt.trim().is_empty() {
            return invalid("pretty-printer load statement is empty".to_string());
        }
        if self.breakpoints.is_empty() {
            return invalid("at least one breakpoint is required".to_string());
        }

        let mut seen = HashSet::new();
        for bp in &self.breakpoints {
            if bp.line == 0 {
                return invalid("breakpoint lines start at 1".to_string());
            }
            if !seen.insert(bp.line) {
                return invalid(format!("duplicate breakpoint at line {}", bp.line));
            }
            for check in &bp.checks {
                if check.expression.trim().is_empty() {
                    return invalid(format!("empty expression at line {}", bp.line));
                }
                if check.contains.is_empty() {
                    return invalid(format!(
                        "'{}' at line {} expects no substrings",
                        check.expression, bp.line
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src_file(&self) -> &Path {
        &self.src_file
    }

    pub fn cc(&self) -> &str {
        &self.cc
    }

    pub fn pp_script(&self) -> &Path {
        &self.pp_script
    }

    pub fn load_stmt(&self) -> &str {
        &self.load_stmt
    }

    pub fn breakpoints(&self) -> &[BreakpointSpec] {
        &self.breakpoints
    }

    /// Deterministic executable name: `getitem.cc` becomes `getitem_cc__`
    pub fn exe_name(&self) -> String {
        let base = self
            .src_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}__", base.replace('.', "_"))
    }
}
