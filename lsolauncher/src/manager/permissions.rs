//! Making installed files usable by every local user.

use std::path::{Path, PathBuf};

use super::error::{PipelineError, PipelineResult};

/// Group granted full control on Windows installs.
pub const WINDOWS_USERS_GRANT: &str = "Users:(OI)(CI)F";

/// Arguments to `icacls` granting [`WINDOWS_USERS_GRANT`] on `dir`,
/// recursively.
pub fn icacls_args(dir: &Path) -> Vec<String> {
    vec![
        dir.display().to_string(),
        "/grant:r".to_string(),
        WINDOWS_USERS_GRANT.to_string(),
        "/T".to_string(),
    ]
}

/// Open up `root` for all users.
///
/// POSIX: directories and `executables` become `0o755`, other files gain
/// at least `0o644`. Symlinks are left alone. Windows: `icacls`.
pub fn make_accessible(root: &Path, executables: &[PathBuf]) -> PipelineResult<()> {
    #[cfg(unix)]
    {
        chmod_tree(root, executables)
    }
    #[cfg(windows)]
    {
        let _ = executables;
        run_icacls(root)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (root, executables);
        Ok(())
    }
}

#[cfg(windows)]
pub(crate) fn run_icacls(root: &Path) -> PipelineResult<()> {
    let output = std::process::Command::new("icacls")
        .args(icacls_args(root))
        .output()
        .map_err(|e| PipelineError::PermissionDenied {
            path: root.to_path_buf(),
            reason: format!("cannot run icacls: {}", e),
        })?;
    if !output.status.success() {
        return Err(PipelineError::PermissionDenied {
            path: root.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn chmod_tree(root: &Path, executables: &[PathBuf]) -> PipelineResult<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let denied = |path: &Path, e: std::io::Error| PipelineError::PermissionDenied {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let meta = fs::symlink_metadata(root).map_err(|e| denied(root, e))?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    let current = meta.permissions().mode() & 0o7777;
    let wanted = if meta.is_dir() || executables.iter().any(|exe| exe == root) {
        current | 0o755
    } else {
        current | 0o644
    };
    if wanted != current {
        fs::set_permissions(root, fs::Permissions::from_mode(wanted)).map_err(|e| denied(root, e))?;
    }

    if meta.is_dir() {
        for entry in fs::read_dir(root).map_err(|e| denied(root, e))? {
            let entry = entry.map_err(|e| denied(root, e))?;
            chmod_tree(&entry.path(), executables)?;
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_make_accessible() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("LegacySO");
        let content = root.join("Content");
        fs::create_dir_all(&content).unwrap();
        let exe = root.join("LegacySO.exe");
        let data = content.join("data.dat");
        fs::write(&exe, b"MZ").unwrap();
        fs::write(&data, b"d").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(&data, fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(&content, fs::Permissions::from_mode(0o700)).unwrap();

        make_accessible(&root, &[exe.clone()]).unwrap();

        assert_eq!(mode(&exe), 0o755);
        assert_eq!(mode(&data), 0o644);
        assert_eq!(mode(&content), 0o755);
    }

    #[test]
    fn test_missing_root_is_permission_error() {
        let err = make_accessible(Path::new("/nonexistent/lso"), &[]).unwrap_err();
        assert!(matches!(err, PipelineError::PermissionDenied { .. }));
    }

    #[test]
    fn test_icacls_args() {
        let args = icacls_args(Path::new("C:/Games/LegacySO"));
        assert_eq!(args, ["C:/Games/LegacySO", "/grant:r", "Users:(OI)(CI)F", "/T"]);
    }
}
