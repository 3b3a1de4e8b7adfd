//! Game launching.
//!
//! Builds the client command line from the `[Game]` settings and starts the
//! installed client detached from the launcher:
//!
//! ```text
//! LegacySO.exe w -gl -lang0 -hz60          (Windows)
//! mono LegacySO.exe w -gl -ide -lang0 -hz60 (elsewhere, volcanic variant)
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::component::{Catalog, Component};
use crate::config::GameSettings;
use crate::discovery::find_executable;
use crate::manager::ErrorClass;
use crate::orchestrator::InstalledState;

/// Runtime used to start .NET executables outside Windows.
pub const MONO: &str = "mono";

/// Result type for launch operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors starting the game.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("'{0}' is not a launchable game")]
    UnknownComponent(String),

    #[error("{name} is not installed; install it first")]
    NeedsInstall { name: String },

    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownComponent(_) => ErrorClass::Validation,
            Self::NeedsInstall { .. } => ErrorClass::MissingDependency,
            Self::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                ErrorClass::Permission
            }
            Self::Spawn { .. } => ErrorClass::General,
        }
    }
}

/// Map a user-facing game name to a component code.
pub fn resolve_alias(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "game" | "lso" | "legacyso" => Some("LSO"),
        "simitone" | "ts1" => Some("Simitone"),
        _ => None,
    }
}

/// Client start-up variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchVariant {
    #[default]
    Default,
    /// Volcanic editor.
    Volcanic,
    ThreeD,
}

impl LaunchVariant {
    pub fn launch_arg(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Volcanic => Some("-ide"),
            Self::ThreeD => Some("-3d"),
        }
    }
}

impl fmt::Display for LaunchVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Volcanic => "volcanic",
            Self::ThreeD => "3d",
        })
    }
}

impl FromStr for LaunchVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "volcanic" | "ide" => Ok(Self::Volcanic),
            "3d" => Ok(Self::ThreeD),
            other => Err(format!(
                "unknown launch variant '{}' (expected default, volcanic or 3d)",
                other
            )),
        }
    }
}

/// Everything needed to start the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A started client. The launcher does not wait for it.
#[derive(Debug, Clone)]
pub struct LaunchedProcess {
    pub pid: u32,
    pub plan: LaunchPlan,
}

/// Builds and starts launch plans for installed games.
pub struct LaunchController<'a> {
    catalog: &'a Catalog,
    installed: &'a InstalledState,
    settings: GameSettings,
    use_mono: bool,
}

impl<'a> LaunchController<'a> {
    pub fn new(catalog: &'a Catalog, installed: &'a InstalledState, settings: GameSettings) -> Self {
        Self {
            catalog,
            installed,
            settings,
            use_mono: !cfg!(windows),
        }
    }

    /// Start executables through `mono`.
    pub fn with_mono(mut self, use_mono: bool) -> Self {
        self.use_mono = use_mono;
        self
    }

    /// Command line for `game` (code or alias).
    pub fn plan(&self, game: &str, variant: LaunchVariant) -> LaunchResult<LaunchPlan> {
        let component = self.component(game)?;
        let needs_install = || LaunchError::NeedsInstall {
            name: component.name().to_string(),
        };

        let root = self.installed.get(component.code()).ok_or_else(needs_install)?;
        let executable = find_executable(component, &root).ok_or_else(needs_install)?;

        let mut args = Vec::new();
        let program = if self.use_mono {
            args.push(executable.to_string_lossy().into_owned());
            PathBuf::from(MONO)
        } else {
            executable
        };

        args.push("w".to_string());
        args.push(self.settings.graphics_mode.launch_arg().to_string());
        if let Some(flag) = variant.launch_arg() {
            args.push(flag.to_string());
        }
        args.push(format!("-lang{}", self.settings.language.id()));
        args.push(format!(
            "-hz{}",
            self.settings.refresh_bounds.clamp(self.settings.refresh_rate())
        ));

        Ok(LaunchPlan {
            program,
            args,
            cwd: root,
        })
    }

    /// Start `game` detached and return without waiting.
    pub fn launch(&self, game: &str, variant: LaunchVariant) -> LaunchResult<LaunchedProcess> {
        let plan = self.plan(game, variant)?;
        let pid = spawn_detached(&plan)?;
        info!(program = %plan.program.display(), pid, variant = %variant, "Game started");
        Ok(LaunchedProcess { pid, plan })
    }

    fn component(&self, game: &str) -> LaunchResult<&Component> {
        let code = resolve_alias(game).unwrap_or(game);
        self.catalog
            .get(code)
            .filter(|c| resolve_alias(c.code()).is_some())
            .ok_or_else(|| LaunchError::UnknownComponent(game.to_string()))
    }
}

fn spawn_detached(plan: &LaunchPlan) -> LaunchResult<u32> {
    let mut command = Command::new(&plan.program);
    command
        .args(&plan.args)
        .current_dir(&plan.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        program: plan.program.clone(),
        source,
    })?;
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameLanguage, GraphicsMode};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Component::new("LSO", "LegacySO").with_executables(["LegacySO.exe"]),
            Component::new("Simitone", "Simitone").with_executables(["Simitone.Windows.exe"]),
            Component::new("OpenAL", "OpenAL").with_executables(["OpenAL32.dll"]),
        ])
        .unwrap()
    }

    fn installed_lso(temp: &TempDir) -> InstalledState {
        let root = temp.path().join("LegacySO");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("LegacySO.exe"), b"MZ").unwrap();
        let state = InstalledState::new();
        state.mark_installed(&Component::new("LSO", "LegacySO"), &root);
        state
    }

    fn settings() -> GameSettings {
        let mut settings = GameSettings::default();
        settings.graphics_mode = GraphicsMode::OpenGl;
        settings.language = "French".parse::<GameLanguage>().unwrap();
        settings
    }

    #[test]
    fn test_aliases() {
        assert_eq!(resolve_alias("game"), Some("LSO"));
        assert_eq!(resolve_alias("LegacySO"), Some("LSO"));
        assert_eq!(resolve_alias("ts1"), Some("Simitone"));
        assert_eq!(resolve_alias("openal"), None);
    }

    #[test]
    fn test_variants_parse() {
        assert_eq!("volcanic".parse::<LaunchVariant>(), Ok(LaunchVariant::Volcanic));
        assert_eq!("3D".parse::<LaunchVariant>(), Ok(LaunchVariant::ThreeD));
        assert_eq!("".parse::<LaunchVariant>(), Ok(LaunchVariant::Default));
        assert!("fast".parse::<LaunchVariant>().is_err());
    }

    #[test]
    fn test_plan_without_mono() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog();
        let state = installed_lso(&temp);
        let controller = LaunchController::new(&catalog, &state, settings()).with_mono(false);

        let plan = controller.plan("game", LaunchVariant::Volcanic).unwrap();
        assert_eq!(plan.cwd, temp.path().join("LegacySO"));
        assert_eq!(plan.program, temp.path().join("LegacySO").join("LegacySO.exe"));
        assert_eq!(plan.args, vec!["w", "-gl", "-ide", "-lang3", "-hz60"]);
    }

    #[test]
    fn test_plan_with_mono_puts_executable_first() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog();
        let state = installed_lso(&temp);
        let controller = LaunchController::new(&catalog, &state, settings()).with_mono(true);

        let plan = controller.plan("LSO", LaunchVariant::Default).unwrap();
        assert_eq!(plan.program, Path::new(MONO));
        assert!(plan.args[0].ends_with("LegacySO.exe"));
        assert_eq!(&plan.args[1..], ["w", "-gl", "-lang3", "-hz60"]);
    }

    #[test]
    fn test_refresh_rate_is_clamped() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog();
        let state = installed_lso(&temp);
        let mut settings = settings();
        settings.set_refresh_rate(9999);
        let controller = LaunchController::new(&catalog, &state, settings).with_mono(false);

        let plan = controller.plan("lso", LaunchVariant::ThreeD).unwrap();
        assert_eq!(plan.args.last().map(String::as_str), Some("-hz144"));
        assert!(plan.args.contains(&"-3d".to_string()));
    }

    #[test]
    fn test_not_installed_needs_install() {
        let catalog = catalog();
        let state = InstalledState::new();
        let controller = LaunchController::new(&catalog, &state, settings());

        let err = controller.plan("simitone", LaunchVariant::Default).unwrap_err();
        assert!(matches!(err, LaunchError::NeedsInstall { .. }));
        assert_eq!(err.class().exit_code(), 13);
    }

    #[test]
    fn test_missing_executable_needs_install() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog();
        let state = InstalledState::new();
        state.mark_installed(&Component::new("LSO", "LegacySO"), temp.path());
        let controller = LaunchController::new(&catalog, &state, settings());

        assert!(matches!(
            controller.plan("LSO", LaunchVariant::Default),
            Err(LaunchError::NeedsInstall { .. })
        ));
    }

    #[test]
    fn test_non_game_components_are_rejected() {
        let catalog = catalog();
        let state = InstalledState::new();
        let controller = LaunchController::new(&catalog, &state, settings());

        let err = controller.plan("OpenAL", LaunchVariant::Default).unwrap_err();
        assert!(matches!(err, LaunchError::UnknownComponent(_)));
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let plan = LaunchPlan {
            program: temp.path().join("missing-binary"),
            args: Vec::new(),
            cwd: temp.path().to_path_buf(),
        };
        assert!(matches!(spawn_detached(&plan), Err(LaunchError::Spawn { .. })));
    }
}
