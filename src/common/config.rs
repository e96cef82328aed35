//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Debug adapter configurations
    #[serde(default)]
    pub adapters: HashMap<String, AdapterConfig>,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Native compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Value rendering settings
    #[serde(default)]
    pub render: RenderConfig,
}

/// Adapter type, selects how pretty printers get loaded
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// lldb-dap (LLVM debugger)
    #[default]
    LldbDap,
    /// GDB's built-in DAP interpreter (`gdb -i dap`)
    Gdb,
    /// Generic DAP adapter, lldb-style commands sent through the REPL
    Generic,
}

impl AdapterType {
    /// Debugger commands that load a pretty-printer script and run its load statement
    pub fn pretty_printer_commands(&self, script: &Path, load_stmt: &str) -> Vec<String> {
        match self {
            AdapterType::LldbDap | AdapterType::Generic => vec![
                format!("command script import {}", script.display()),
                format!("script {load_stmt}"),
            ],
            AdapterType::Gdb => vec![
                format!("source {}", script.display()),
                format!("python {load_stmt}"),
            ],
        }
    }

    /// Whether the commands are passed as launch `initCommands`
    /// rather than evaluated in the REPL after launch
    pub fn uses_init_commands(&self) -> bool {
        matches!(self, AdapterType::LldbDap)
    }
}

/// Configuration for a debug adapter
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterConfig {
    /// Path to the adapter executable
    pub path: PathBuf,

    /// Additional arguments to pass to the adapter
    #[serde(default)]
    pub args: Vec<String>,

    /// Adapter type for specialized handling
    #[serde(default)]
    pub adapter_type: AdapterType,
}

/// Default settings
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Default adapter to use
    #[serde(default = "default_adapter")]
    pub adapter: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
        }
    }
}

fn default_adapter() -> String {
    "lldb-dap".to_string()
}

/// Native compiler settings
#[derive(Debug, Deserialize, Clone)]
pub struct CompilerConfig {
    /// Compiler used when a test case does not name one
    #[serde(default = "default_compiler")]
    pub command: String,

    /// Flags placed before the source file
    #[serde(default = "default_compiler_flags")]
    pub flags: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: default_compiler(),
            flags: default_compiler_flags(),
        }
    }
}

fn default_compiler() -> String {
    "c++".to_string()
}

fn default_compiler_flags() -> Vec<String> {
    vec!["-g".to_string(), "-std=c++11".to_string()]
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Timeout for DAP initialize request
    #[serde(default = "default_dap_initialize")]
    pub dap_initialize_secs: u64,

    /// Timeout for general DAP requests
    #[serde(default = "default_dap_request")]
    pub dap_request_secs: u64,

    /// Timeout waiting for the process to stop; unset waits forever
    #[serde(default)]
    pub stop_secs: Option<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dap_initialize_secs: default_dap_initialize(),
            dap_request_secs: default_dap_request(),
            stop_secs: None,
        }
    }
}

fn default_dap_initialize() -> u64 {
    10
}
fn default_dap_request() -> u64 {
    30
}

/// Value rendering settings
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// How many levels of children are expanded when rendering a value
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    2
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but cannot work
    fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self
            .adapters
            .iter()
            .find(|(_, a)| a.path.as_os_str().is_empty())
        {
            return Err(super::Error::Config(format!("adapter '{name}' has an empty path")));
        }
        if self.compiler.command.trim().is_empty() {
            return Err(super::Error::Config("compiler command is empty".to_string()));
        }
        if self.timeouts.stop_secs == Some(0) {
            return Err(super::Error::Config("timeouts.stop_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Get adapter configuration by name
    ///
    /// Falls back to searching PATH if not explicitly configured
    pub fn get_adapter(&self, name: &str) -> Option<AdapterConfig> {
        // Check explicit configuration first
        if let Some(config) = self.adapters.get(name) {
            return Some(config.clone());
        }

        // Try to find in PATH
        which::which(name).ok().map(|path| {
            let (adapter_type, args) = match name {
                "lldb-dap" | "lldb-vscode" => (AdapterType::LldbDap, Vec::new()),
                "gdb" => (AdapterType::Gdb, vec!["-i".to_string(), "dap".to_string()]),
                _ => (AdapterType::Generic, Vec::new()),
            };
            AdapterConfig {
                path,
                args,
                adapter_type,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.defaults.adapter, "lldb-dap");
        assert_eq!(config.compiler.flags, vec!["-g", "-std=c++11"]);
        assert_eq!(config.timeouts.stop_secs, None);
        assert_eq!(config.render.max_depth, 2);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
[adapters.mock]
path = "/opt/mock"
args = ["--trace", "t.json"]
adapter_type = "generic"

[defaults]
adapter = "mock"

[timeouts]
stop_secs = 5
"#,
        )
        .unwrap();

        let adapter = config.get_adapter("mock").unwrap();
        assert_eq!(adapter.path, PathBuf::from("/opt/mock"));
        assert_eq!(adapter.adapter_type, AdapterType::Generic);
        assert_eq!(config.defaults.adapter, "mock");
        assert_eq!(config.timeouts.stop_secs, Some(5));
        assert_eq!(config.timeouts.dap_request_secs, 30);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (content, expected) in [
            ("[adapters.mock]\npath = \"\"\n", "adapter 'mock' has an empty path"),
            ("[compiler]\ncommand = \" \"\n", "compiler command is empty"),
            ("[timeouts]\nstop_secs = 0\n", "stop_secs must be positive"),
        ] {
            let path = dir.path().join("config.toml");
            std::fs::write(&path, content).unwrap();
            let err = Config::from_file(&path).unwrap_err();
            assert!(matches!(&err, crate::common::Error::Config(m) if m.contains(expected)), "{err}");
        }
    }

    #[test]
    fn test_pretty_printer_commands() {
        let script = Path::new("/pp/printers.py");
        let lldb = AdapterType::LldbDap.pretty_printer_commands(script, "printers.register()");
        assert_eq!(
            lldb,
            vec![
                "command script import /pp/printers.py",
                "script printers.register()"
            ]
        );
        let gdb = AdapterType::Gdb.pretty_printer_commands(script, "printers.register()");
        assert_eq!(gdb[0], "source /pp/printers.py");
        assert_eq!(gdb[1], "python printers.register()");
        assert!(AdapterType::LldbDap.uses_init_commands());
        assert!(!AdapterType::Gdb.uses_init_commands());
    }
}
