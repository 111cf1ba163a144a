//! Expo managed-runtime driver.
//!
//! Prepares the frontend for Expo (dependencies, CLIs, `eas.json`), runs the
//! Expo dev server in the foreground and triggers EAS cloud builds. All
//! commands run in `<root>/frontend`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::process::{CommandRunner, ProcessInvocation};
use crate::types::{Platform, ShellError, StepOutcome};

/// Build-service configuration file written into the frontend directory.
pub const EAS_CONFIG_FILE: &str = "eas.json";

/// Tools made available through `npx`: (binary, npm package).
const NPX_TOOLS: [(&str, &str); 2] = [("expo", "expo-cli"), ("eas", "eas-cli")];

/// Contents of `eas.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EasConfig {
    pub build: EasBuildProfiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EasBuildProfiles {
    pub development: EasProfile,
    pub preview: EasProfile,
    pub production: EasProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EasProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

impl Default for EasConfig {
    fn default() -> Self {
        Self {
            build: EasBuildProfiles {
                development: EasProfile {
                    development_client: Some(true),
                    distribution: Some("internal".to_string()),
                },
                preview: EasProfile {
                    development_client: None,
                    distribution: Some("internal".to_string()),
                },
                production: EasProfile::default(),
            },
        }
    }
}

/// Drives the Expo CLI and EAS for the frontend project.
pub struct ExpoDriver {
    frontend_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    /// PATH lookup, replaced in tests.
    lookup: fn(&str) -> bool,
}

fn on_path(tool: &str) -> bool {
    which::which(tool).is_ok()
}

impl ExpoDriver {
    pub fn new(root_dir: impl AsRef<Path>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            frontend_dir: root_dir.as_ref().join("frontend"),
            runner,
            lookup: on_path,
        }
    }

    pub fn frontend_dir(&self) -> &Path {
        &self.frontend_dir
    }

    pub fn eas_config_path(&self) -> PathBuf {
        self.frontend_dir.join(EAS_CONFIG_FILE)
    }

    fn npm(&self, args: &[&str]) -> ProcessInvocation {
        ProcessInvocation::new("npm", args.iter().copied()).in_dir(&self.frontend_dir)
    }

    fn npx(&self, args: &[&str]) -> ProcessInvocation {
        ProcessInvocation::new("npx", args.iter().copied()).in_dir(&self.frontend_dir)
    }

    /// Prepares the project for Expo development.
    ///
    /// Returns the outcome of the best-effort `npx` provisioning; every other
    /// step is required and fails the setup.
    pub fn setup(&self) -> Result<StepOutcome, ShellError> {
        info!("Setting up Expo development environment...");

        info!("Installing Expo dependencies...");
        self.runner
            .run(&self.npm(&["install", "--legacy-peer-deps"]))
            .map_err(|source| ShellError::SetupFailed {
                what: "installing Expo dependencies".to_string(),
                source,
            })?;

        let npx = self.ensure_tool_runner();

        let local_expo = self.frontend_dir.join("node_modules").join(".bin").join("expo");
        if local_expo.exists() {
            info!("Local expo found at {}", local_expo.display());
            if let Some(bin) = local_expo.parent() {
                info!("Add it to PATH with: export PATH=\"{}:$PATH\"", bin.display());
            }
        }

        for (tool, package) in NPX_TOOLS {
            self.ensure_npx_tool(tool, package)?;
        }

        self.write_eas_config()?;
        Ok(npx)
    }

    /// Makes sure `npx` is on PATH, trying a system package install otherwise.
    ///
    /// The install usually needs elevated privileges, so failing it only
    /// skips the step.
    pub fn ensure_tool_runner(&self) -> StepOutcome {
        if (self.lookup)("npx") {
            return StepOutcome::Done;
        }

        info!("Installing npx (part of Node.js)...");
        let hint = "Please ensure Node.js and npm are installed on your system";
        let update = ProcessInvocation::new("apt-get", ["update"]);
        if let Err(e) = self.runner.run(&update) {
            warn!("Could not update package lists ({}). You may need sudo privileges.", e);
            warn!("{}", hint);
            return StepOutcome::skipped(format!("apt-get update failed: {}", e));
        }

        let install = ProcessInvocation::new("apt-get", ["install", "-y", "nodejs", "npm"]);
        if let Err(e) = self.runner.run(&install) {
            warn!("Could not install Node.js and npm ({}). You may need sudo privileges.", e);
            warn!("{}", hint);
            return StepOutcome::skipped(format!("apt-get install failed: {}", e));
        }

        StepOutcome::Done
    }

    fn ensure_npx_tool(&self, tool: &str, package: &str) -> Result<(), ShellError> {
        if self.runner.probe(&self.npx(&["--no-install", tool, "--version"])) {
            return Ok(());
        }

        info!("Installing {} in project...", package);
        self.runner
            .run(&self.npm(&["install", "--save-dev", package]))
            .map_err(|source| ShellError::SetupFailed {
                what: format!("installing {}", package),
                source,
            })
    }

    /// Writes `eas.json`, replacing whatever was there.
    pub fn write_eas_config(&self) -> Result<(), ShellError> {
        info!("Creating EAS configuration...");
        let path = self.eas_config_path();
        let write_failed = |reason: String| ShellError::ConfigWriteFailed {
            path: path.clone(),
            reason,
        };

        let json = serde_json::to_string_pretty(&EasConfig::default())
            .map_err(|e| write_failed(e.to_string()))?;
        fs::write(&path, json).map_err(|e| write_failed(e.to_string()))
    }

    pub fn read_eas_config(&self) -> Result<EasConfig, ShellError> {
        let path = self.eas_config_path();
        let read_failed = |reason: String| ShellError::ConfigWriteFailed {
            path: path.clone(),
            reason,
        };

        let contents = fs::read_to_string(&path).map_err(|e| read_failed(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| read_failed(e.to_string()))
    }

    /// Runs the Expo dev server in the foreground.
    ///
    /// If `npx expo start` fails, the project's npm script for the same target
    /// is tried once. Neither attempt is subject to the runner's timeout.
    pub fn start_dev_server(&self, platform: Option<Platform>) -> Result<(), ShellError> {
        let target = platform.map_or("default", |p| p.as_str());
        info!("Starting Expo development server for {}...", target);

        let (flag, script) = match platform {
            Some(Platform::Web) => (Some("--web"), "expo-web"),
            Some(Platform::Android) => (Some("--android"), "expo-android"),
            Some(Platform::Ios) => (Some("--ios"), "expo-ios"),
            None => (None, "expo-start"),
        };

        let mut args = vec!["expo", "start"];
        args.extend(flag);
        if let Err(e) = self.runner.run(&self.npx(&args).without_timeout()) {
            warn!("npx expo start failed ({}), trying npm script {}", e, script);
            return self
                .runner
                .run(&self.npm(&["run", script]).without_timeout())
                .map_err(ShellError::DevServerFailed);
        }
        Ok(())
    }

    /// Starts a production EAS build for a native platform.
    pub fn build_app(&self, platform: Platform) -> Result<(), ShellError> {
        if platform == Platform::Web {
            return Err(ShellError::UnsupportedPlatform(format!(
                "{} (Expo builds target android or ios)",
                platform
            )));
        }

        info!("Building Expo app for {}...", platform);
        let invocation = self.npx(&[
            "eas",
            "build",
            "--platform",
            platform.as_str(),
            "--profile",
            "production",
        ]);
        self.runner
            .run(&invocation)
            .map_err(|source| ShellError::BuildFailed {
                target: format!("expo {}", platform),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;
    use tempfile::TempDir;

    fn found(_: &str) -> bool {
        true
    }

    fn missing(_: &str) -> bool {
        false
    }

    fn new_driver(root: &Path, npx_on_path: bool) -> (ExpoDriver, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::new());
        let mut driver = ExpoDriver::new(root, runner.clone());
        driver.lookup = if npx_on_path { found } else { missing };
        (driver, runner)
    }

    fn frontend(dir: &TempDir) -> PathBuf {
        let frontend = dir.path().join("frontend");
        fs::create_dir_all(&frontend).unwrap();
        frontend
    }

    #[test]
    fn eas_config_round_trip() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, _) = new_driver(dir.path(), true);

        driver.write_eas_config().unwrap();
        assert_eq!(driver.read_eas_config().unwrap(), EasConfig::default());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(driver.eas_config_path()).unwrap()).unwrap();
        assert_eq!(raw["build"]["development"]["developmentClient"], true);
        assert_eq!(raw["build"]["preview"]["distribution"], "internal");
        assert!(raw["build"]["preview"].get("developmentClient").is_none());
        assert_eq!(raw["build"]["production"], serde_json::json!({}));
    }

    #[test]
    fn eas_config_is_overwritten() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, _) = new_driver(dir.path(), true);
        fs::write(driver.eas_config_path(), "{\"cli\": {}}").unwrap();

        driver.write_eas_config().unwrap();
        assert_eq!(driver.read_eas_config().unwrap(), EasConfig::default());
    }

    #[test]
    fn eas_config_write_failure() {
        let dir = TempDir::new().unwrap();
        let (driver, _) = new_driver(dir.path(), true);
        assert!(matches!(
            driver.write_eas_config(),
            Err(ShellError::ConfigWriteFailed { .. })
        ));
    }

    #[test]
    fn setup_installs_missing_clis() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, runner) = new_driver(dir.path(), true);
        runner.fail_when(|inv| inv.program == "npx");

        let outcome = driver.setup().unwrap();

        assert_eq!(outcome, StepOutcome::Done);
        assert_eq!(
            runner.commands(),
            vec![
                "npm install --legacy-peer-deps",
                "npx --no-install expo --version",
                "npm install --save-dev expo-cli",
                "npx --no-install eas --version",
                "npm install --save-dev eas-cli",
            ]
        );
        assert!(driver.eas_config_path().exists());
    }

    #[test]
    fn setup_skips_cli_install_when_available() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, runner) = new_driver(dir.path(), true);

        driver.setup().unwrap();
        assert!(!runner.commands().iter().any(|c| c.contains("--save-dev")));
    }

    #[test]
    fn setup_fails_when_dependency_install_fails() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, runner) = new_driver(dir.path(), true);
        runner.fail_when(|inv| inv.args.contains(&"--legacy-peer-deps".to_string()));

        assert!(matches!(driver.setup(), Err(ShellError::SetupFailed { .. })));
        assert_eq!(runner.calls().len(), 1);
        assert!(!driver.eas_config_path().exists());
    }

    #[test]
    fn missing_npx_install_failure_is_skipped() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, runner) = new_driver(dir.path(), false);
        runner.fail_when(|inv| inv.program == "apt-get");

        let outcome = driver.setup().unwrap();

        assert!(outcome.is_skipped());
        assert!(runner.commands().contains(&"apt-get update".to_string()));
        assert!(!runner.commands().iter().any(|c| c.starts_with("apt-get install")));
        assert!(driver.eas_config_path().exists());
    }

    #[test]
    fn missing_npx_is_installed() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), false);
        assert_eq!(driver.ensure_tool_runner(), StepOutcome::Done);
        assert_eq!(
            runner.commands(),
            vec!["apt-get update", "apt-get install -y nodejs npm"]
        );
    }

    #[test]
    fn dev_server_uses_platform_flag() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), true);
        driver.start_dev_server(Some(Platform::Android)).unwrap();
        driver.start_dev_server(None).unwrap();
        assert_eq!(
            runner.commands(),
            vec!["npx expo start --android", "npx expo start"]
        );
        assert_eq!(runner.calls()[0].cwd.as_deref(), Some(driver.frontend_dir()));
    }

    #[test]
    fn dev_server_falls_back_once() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), true);
        runner.fail_when(|inv| inv.program == "npx");

        driver.start_dev_server(Some(Platform::Web)).unwrap();
        assert_eq!(
            runner.commands(),
            vec!["npx expo start --web", "npm run expo-web"]
        );
        assert!(runner.calls().iter().all(|inv| inv.unbounded));
    }

    #[test]
    fn only_dev_server_escapes_timeout() {
        let dir = TempDir::new().unwrap();
        frontend(&dir);
        let (driver, runner) = new_driver(dir.path(), true);
        runner.fail_when(|inv| inv.args.iter().any(|arg| arg == "--no-install"));

        driver.setup().unwrap();
        let setup_calls = runner.calls().len();
        assert!(setup_calls > 0);
        driver.start_dev_server(None).unwrap();

        let calls = runner.calls();
        assert!(calls[..setup_calls].iter().all(|inv| !inv.unbounded));
        assert!(calls[setup_calls..].iter().all(|inv| inv.unbounded));
    }

    #[test]
    fn dev_server_fails_after_fallback() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), true);
        runner.fail_when(|_| true);

        let err = driver.start_dev_server(Some(Platform::Ios)).unwrap_err();
        assert!(matches!(err, ShellError::DevServerFailed(_)));
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.commands()[1], "npm run expo-ios");
    }

    #[test]
    fn build_app_targets_production_profile() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), true);
        driver.build_app(Platform::Ios).unwrap();
        assert_eq!(
            runner.commands(),
            vec!["npx eas build --platform ios --profile production"]
        );
    }

    #[test]
    fn build_app_rejects_web_without_running() {
        let dir = TempDir::new().unwrap();
        let (driver, runner) = new_driver(dir.path(), true);
        assert!(matches!(
            driver.build_app(Platform::Web),
            Err(ShellError::UnsupportedPlatform(_))
        ));
        assert!(runner.calls().is_empty());
    }
}
