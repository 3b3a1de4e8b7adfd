//! Moving extracted files into their install root.
//!
//! Install roots may sit in directories only an administrator can write,
//! such as `C:\Program Files`. On Windows [`ElevatedCopy`] first tries a
//! plain copy and, when that is refused, runs a one-shot batch script through
//! an elevation prompt:
//!
//! ```text
//! DirectCopy ──PermissionDenied──> write .bat ──> powershell Start-Process -Verb RunAs -Wait
//!                                                      │
//!                                        rmdir / xcopy / icacls, then .bat removed
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{ErrorClass, PipelineError, PipelineResult};
use super::permissions::{make_accessible, WINDOWS_USERS_GRANT};

/// What happens to files already at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Clear the destination first.
    Replace,
    /// Overwrite file by file, keeping everything else.
    Merge,
}

/// Copies into install roots and opens them up for all users.
pub trait PrivilegedCopy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Copy the contents of `source` into `dest`. Running twice gives the
    /// same result.
    fn copy(&self, source: &Path, dest: &Path, mode: CopyMode) -> PipelineResult<()>;

    /// Grant every local user access to `dest`.
    fn grant_access(&self, dest: &Path, executables: &[PathBuf]) -> PipelineResult<()>;
}

/// Copies with the current user's rights.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCopy;

impl PrivilegedCopy for DirectCopy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn copy(&self, source: &Path, dest: &Path, mode: CopyMode) -> PipelineResult<()> {
        if mode == CopyMode::Replace && dest.exists() {
            debug!(dest = %dest.display(), "Clearing destination");
            fs::remove_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;
        }
        let files = copy_dir_recursive(source, dest)?;
        debug!(dest = %dest.display(), files, ?mode, "Files copied");
        Ok(())
    }

    fn grant_access(&self, dest: &Path, executables: &[PathBuf]) -> PipelineResult<()> {
        make_accessible(dest, executables)
    }
}

/// Direct copy with a fallback to an elevated batch script.
#[derive(Debug, Clone)]
pub struct ElevatedCopy {
    script_dir: PathBuf,
}

impl ElevatedCopy {
    /// Batch scripts are written to `script_dir`.
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
        }
    }

    fn run_elevated(&self, script: &str, dest: &Path) -> PipelineResult<()> {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        fs::create_dir_all(&self.script_dir).map_err(|e| PipelineError::io(&self.script_dir, e))?;
        let path = self.script_dir.join(format!(
            "lsolauncher-{}-{}.bat",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _script = ScriptFile(path.clone());
        fs::write(&path, script).map_err(|e| PipelineError::io(&path, e))?;

        info!(dest = %dest.display(), "Requesting elevation");
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &start_process_command(&path)])
            .output()
            .map_err(|e| PipelineError::PermissionDenied {
                path: dest.to_path_buf(),
                reason: format!("cannot run powershell: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::PermissionDenied {
                path: dest.to_path_buf(),
                reason: match output.status.code() {
                    Some(code) if stderr.trim().is_empty() => {
                        format!("elevated script exited with code {}", code)
                    }
                    _ => stderr.trim().to_string(),
                },
            });
        }
        Ok(())
    }
}

impl PrivilegedCopy for ElevatedCopy {
    fn name(&self) -> &'static str {
        "elevated"
    }

    fn copy(&self, source: &Path, dest: &Path, mode: CopyMode) -> PipelineResult<()> {
        match DirectCopy.copy(source, dest, mode) {
            Err(e) if e.class() == ErrorClass::Permission => {
                warn!(dest = %dest.display(), error = %e, "Direct copy refused, elevating");
                self.run_elevated(&copy_script(source, dest, mode), dest)
            }
            other => other,
        }
    }

    fn grant_access(&self, dest: &Path, executables: &[PathBuf]) -> PipelineResult<()> {
        match make_accessible(dest, executables) {
            Err(e) if e.class() == ErrorClass::Permission => {
                warn!(dest = %dest.display(), error = %e, "Granting access needs elevation");
                self.run_elevated(&grant_script(dest), dest)
            }
            other => other,
        }
    }
}

/// Removes the batch script when dropped.
struct ScriptFile(PathBuf);

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(&self.0) {
                warn!(path = %self.0.display(), error = %e, "Failed to remove batch script");
            }
        }
    }
}

/// The copier for the host platform.
pub fn platform_copier(script_dir: &Path) -> Arc<dyn PrivilegedCopy> {
    if cfg!(windows) {
        Arc::new(ElevatedCopy::new(script_dir))
    } else {
        Arc::new(DirectCopy)
    }
}

/// PowerShell command that runs `script` elevated, waits, and exits with
/// its exit code.
fn start_process_command(script: &Path) -> String {
    let script = script.display().to_string().replace('\'', "''");
    format!(
        "$p = Start-Process -FilePath 'cmd.exe' -ArgumentList '/c','\"{}\"' -Verb RunAs -Wait -PassThru -WindowStyle Hidden; exit $p.ExitCode",
        script
    )
}

/// Batch script copying `source` into `dest` and granting access.
pub fn copy_script(source: &Path, dest: &Path, mode: CopyMode) -> String {
    let src = source.display();
    let dst = dest.display();
    let mut lines = vec!["@echo off".to_string()];
    if mode == CopyMode::Replace {
        lines.push(format!("if exist \"{dst}\" rmdir /s /q \"{dst}\""));
    }
    lines.push(format!("if not exist \"{dst}\" mkdir \"{dst}\""));
    lines.push(format!("xcopy \"{src}\\*\" \"{dst}\\\" /E /H /C /I /Y >nul"));
    lines.push("if errorlevel 1 exit /b 1".to_string());
    lines.push(format!("icacls \"{dst}\" /grant:r {WINDOWS_USERS_GRANT} /T >nul"));
    lines.push("exit /b %errorlevel%".to_string());
    lines.join("\r\n")
}

/// Batch script only granting access to `dest`.
pub fn grant_script(dest: &Path) -> String {
    [
        "@echo off".to_string(),
        format!("icacls \"{}\" /grant:r {} /T >nul", dest.display(), WINDOWS_USERS_GRANT),
        "exit /b %errorlevel%".to_string(),
    ]
    .join("\r\n")
}

/// Copy the contents of `source` into `dest`, overwriting files. Returns
/// the number of files copied.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> PipelineResult<usize> {
    fs::create_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;
    let mut count = 0;

    for entry in fs::read_dir(source).map_err(|e| PipelineError::io(source, e))? {
        let entry = entry.map_err(|e| PipelineError::io(source, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| PipelineError::io(&from, e))?;

        if file_type.is_dir() {
            count += copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| PipelineError::io(&to, e))?;
            count += 1;
        }
    }
    Ok(count)
}
