//! Process driver: compiles the test program and owns the executable
//!
//! The executable is removed when the [`Executable`] guard is dropped, so
//! every exit path out of a test run, including a failed compile that left a
//! partial output behind, cleans up after itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::common::{Error, Result};

/// A compiled test executable, deleted on drop
#[derive(Debug)]
pub struct Executable {
    path: PathBuf,
}

impl Executable {
    /// Claim the executable path without building anything yet
    pub fn reserve(path: PathBuf) -> Self {
        Self { path }
    }

    /// Compile `src_file` with `<cc> <flags...> <src> -o <exe>`
    ///
    /// The compiler's stderr ends up in the error; stdout is discarded.
    pub async fn compile(&self, cc: &str, flags: &[String], src_file: &Path) -> Result<()> {
        let compile_error = |status: String, stderr: String| Error::Compilation {
            source_file: src_file.display().to_string(),
            status,
            stderr,
        };

        tracing::info!(
            compiler = cc,
            source = %src_file.display(),
            output = %self.path.display(),
            "Compiling test program"
        );

        let output = Command::new(cc)
            .args(flags)
            .arg(src_file)
            .arg("-o")
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| compile_error(format!("could not run '{cc}'"), e.to_string()))?;

        if !output.status.success() {
            return Err(compile_error(
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        if !self.path.is_file() {
            return Err(compile_error(
                output.status.to_string(),
                format!("compiler produced no file at {}", self.path.display()),
            ));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the executable if it exists
    pub fn remove(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed executable"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "Failed to remove executable: {}", e),
        }
    }
}

impl Drop for Executable {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for a compiler
    fn fake_compiler(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-cc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Shell snippet that touches the file after `-o`
    const TOUCH_OUTPUT: &str = r#"while [ $# -gt 0 ]; do if [ "$1" = "-o" ]; then touch "$2"; fi; shift; done"#;

    #[tokio::test]
    async fn test_compile_and_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cc = fake_compiler(dir.path(), TOUCH_OUTPUT);
        let exe_path = dir.path().join("prog_cc__");

        let exe = Executable::reserve(exe_path.clone());
        exe.compile(cc.to_str().unwrap(), &["-g".to_string()], Path::new("prog.cc"))
            .await
            .unwrap();
        assert!(exe_path.is_file());

        drop(exe);
        assert!(!exe_path.exists());
    }

    #[tokio::test]
    async fn test_compile_failure_reports_stderr_and_cleans_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let cc = fake_compiler(
            dir.path(),
            &format!("{TOUCH_OUTPUT}\necho 'prog.cc:3:1: error: boom' >&2\nexit 1"),
        );
        let exe_path = dir.path().join("prog_cc__");

        let exe = Executable::reserve(exe_path.clone());
        let err = exe
            .compile(cc.to_str().unwrap(), &[], Path::new("prog.cc"))
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::Compilation { stderr, .. } if stderr.contains("error: boom")));
        assert!(exe_path.exists());

        drop(exe);
        assert!(!exe_path.exists());
    }

    #[tokio::test]
    async fn test_missing_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let exe = Executable::reserve(dir.path().join("x__"));
        let err = exe
            .compile("/nonexistent/cc", &[], Path::new("x.cc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { .. }));
    }
}
