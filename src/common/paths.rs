//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/pptest/`
//! - macOS: `~/Library/Application Support/pptest/`
//! - Windows: `%APPDATA%\pptest\`

use std::path::{Path, PathBuf};

/// Name used for the config and data directories
const APP_NAME: &str = "pptest";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }

    #[test]
    fn test_resolve_relative() {
        let base = Path::new("/cases");
        assert_eq!(
            resolve_relative(base, Path::new("a.cc")),
            PathBuf::from("/cases/a.cc")
        );
        assert_eq!(
            resolve_relative(base, Path::new("/src/a.cc")),
            PathBuf::from("/src/a.cc")
        );
    }
}
