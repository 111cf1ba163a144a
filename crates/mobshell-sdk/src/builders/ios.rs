//! iOS build automation
//!
//! Builds the iOS shell project for the simulator with `xcodebuild` and
//! installs/launches the resulting `.app` bundle through `xcrun simctl`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::PlatformBuilder;
use super::common::ensure_entry_point;
use crate::artifact::ArtifactLocator;
use crate::process::{CommandRunner, ProcessInvocation};
use crate::types::{DEFAULT_IOS_BUNDLE_ID, DEFAULT_IOS_SCHEME, Platform, ShellError};

/// Simulator alias used when no device identifier is given.
const BOOTED_SIMULATOR: &str = "booted";

/// Derived data directory, relative to the shell project.
const DERIVED_DATA_DIR: &str = "build";

/// iOS builder for `<root>/mobile-shell/ios`.
pub struct IosBuilder {
    /// Root directory of the project
    root_dir: PathBuf,
    /// iOS shell project directory
    shell_dir: PathBuf,
    /// `App.xcodeproj` inside the shell project
    project_path: PathBuf,
    /// Xcode scheme, also the product name of the `.app` bundle
    scheme: String,
    bundle_id: String,
    runner: Arc<dyn CommandRunner>,
}

impl IosBuilder {
    /// Creates a new iOS builder
    ///
    /// # Arguments
    ///
    /// * `root_dir` - Project root containing `mobile-shell/ios`
    /// * `runner` - Executes xcodebuild and simctl
    pub fn new(root_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        let root_dir = root_dir.into();
        let shell_dir = root_dir.join("mobile-shell").join("ios");
        let project_path = shell_dir.join(format!("{}.xcodeproj", DEFAULT_IOS_SCHEME));

        Self {
            root_dir,
            shell_dir,
            project_path,
            scheme: DEFAULT_IOS_SCHEME.to_string(),
            bundle_id: DEFAULT_IOS_BUNDLE_ID.to_string(),
            runner,
        }
    }

    /// Sets the Xcode scheme; the project file is expected to carry the same name
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self.project_path = self.shell_dir.join(format!("{}.xcodeproj", self.scheme));
        self
    }

    /// Sets the bundle identifier launched after install
    pub fn bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = bundle_id.into();
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// `.app` lookup: the Xcode 13+ derived data layout, then the legacy
    /// layout, then any bundle under the derived data directory.
    pub fn artifact_locator(&self) -> ArtifactLocator {
        let derived = self.shell_dir.join(DERIVED_DATA_DIR);
        let bundle = format!("{}.app", self.scheme);
        ArtifactLocator::new(&derived, "app")
            .candidate(
                derived
                    .join("Build/Products/Debug-iphonesimulator")
                    .join(&bundle),
            )
            .candidate(derived.join("Products/Debug-iphonesimulator").join(&bundle))
    }

    /// simctl takes the device positionally, so an empty id becomes `booted`.
    fn simulator(device_id: &str) -> &str {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            BOOTED_SIMULATOR
        } else {
            device_id
        }
    }

    pub(crate) fn build_invocation(&self) -> ProcessInvocation {
        let project = self
            .project_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.xcodeproj", self.scheme));
        ProcessInvocation::new(
            "xcodebuild",
            [
                "-project",
                project.as_str(),
                "-scheme",
                self.scheme.as_str(),
                "-configuration",
                "Debug",
                "-sdk",
                "iphonesimulator",
                "-derivedDataPath",
                DERIVED_DATA_DIR,
                "build",
            ],
        )
        .in_dir(&self.shell_dir)
    }

    pub(crate) fn install_invocation(&self, device_id: &str, app: &Path) -> ProcessInvocation {
        let app = app.to_string_lossy().into_owned();
        ProcessInvocation::new(
            "xcrun",
            ["simctl", "install", Self::simulator(device_id), app.as_str()],
        )
    }

    pub(crate) fn launch_invocation(&self, device_id: &str) -> ProcessInvocation {
        ProcessInvocation::new(
            "xcrun",
            [
                "simctl",
                "launch",
                Self::simulator(device_id),
                self.bundle_id.as_str(),
            ],
        )
    }
}

impl PlatformBuilder for IosBuilder {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn shell_dir(&self) -> &Path {
        &self.shell_dir
    }

    fn build(&self) -> Result<(), ShellError> {
        info!("Building iOS app...");
        ensure_entry_point(
            &self.project_path,
            "Xcode project",
            "Make sure the iOS project in mobile-shell/ios is set up correctly.",
        )?;

        self.runner
            .run(&self.build_invocation())
            .map_err(|source| ShellError::BuildFailed {
                target: "iOS".to_string(),
                source,
            })
    }

    fn install_app(&self, device_id: &str) -> Result<(), ShellError> {
        info!("Installing iOS app on simulator...");
        let app = self.artifact_locator().locate()?;
        self.runner
            .run(&self.install_invocation(device_id, &app))
            .map_err(|source| ShellError::InstallFailed {
                artifact: app,
                source,
            })
    }

    fn launch_app(&self, device_id: &str) -> Result<(), ShellError> {
        info!("Launching iOS app...");
        self.runner
            .run(&self.launch_invocation(device_id))
            .map_err(|source| ShellError::LaunchFailed {
                app: self.bundle_id.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    fn builder(root: &Path) -> (IosBuilder, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::new());
        (IosBuilder::new(root, runner.clone()), runner)
    }

    #[test]
    fn test_ios_builder_paths() {
        let (builder, _) = builder(Path::new("/tmp/test-project"));
        assert_eq!(
            builder.shell_dir(),
            Path::new("/tmp/test-project/mobile-shell/ios")
        );
        assert_eq!(
            builder.project_path(),
            Path::new("/tmp/test-project/mobile-shell/ios/App.xcodeproj")
        );
        assert_eq!(builder.platform(), Platform::Ios);
    }

    #[test]
    fn scheme_renames_project() {
        let (builder, _) = builder(Path::new("/tmp/p"));
        let builder = builder.scheme("Shell");
        assert!(builder.project_path().ends_with("Shell.xcodeproj"));
        assert!(builder.build_invocation().to_string().contains("-scheme Shell"));
    }

    #[test]
    fn build_fails_fast_without_project() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        assert!(matches!(
            builder.build(),
            Err(ShellError::ToolchainNotFound { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn build_runs_xcodebuild_in_shell_dir() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        fs::create_dir_all(builder.project_path()).unwrap();

        builder.build().unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "xcodebuild");
        assert_eq!(calls[0].cwd.as_deref(), Some(builder.shell_dir()));
        assert_eq!(calls[0].args.last().unwrap(), "build");
    }

    #[test]
    fn empty_device_targets_booted_simulator() {
        let (builder, _) = builder(Path::new("/tmp/p"));
        assert_eq!(
            builder.launch_invocation("").to_string(),
            "xcrun simctl launch booted com.example.golangmobile"
        );
        let install = builder.install_invocation("ABCD-1234", Path::new("/tmp/App.app"));
        assert_eq!(install.to_string(), "xcrun simctl install ABCD-1234 /tmp/App.app");
        assert!(!install.args.iter().any(String::is_empty));
    }

    #[test]
    fn install_finds_bundle_by_search() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        let app = builder
            .shell_dir()
            .join("build/Intermediates/Products/Debug-iphonesimulator/App.app");
        fs::create_dir_all(&app).unwrap();

        builder.install_app("").unwrap();

        assert_eq!(
            runner.commands(),
            vec![format!("xcrun simctl install booted {}", app.display())]
        );
    }

    #[test]
    fn launch_failure_is_reported() {
        let (builder, runner) = builder(Path::new("/tmp/p"));
        runner.fail_when(|inv| inv.args.contains(&"launch".to_string()));
        let err = builder.launch_app("").unwrap_err();
        assert!(matches!(err, ShellError::LaunchFailed { ref app, .. } if app == "com.example.golangmobile"));
    }
}
