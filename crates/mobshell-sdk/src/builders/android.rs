//! Android build automation
//!
//! Builds the Android shell project with its Gradle wrapper and drives `adb`
//! to install, launch and reverse-forward the dev server port.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::PlatformBuilder;
use super::common::{device_selector, ensure_entry_point};
use crate::artifact::ArtifactLocator;
use crate::process::{CommandRunner, ProcessInvocation};
use crate::types::{DEFAULT_ANDROID_COMPONENT, Platform, ShellError};

/// Gradle task producing the debug APK.
const ASSEMBLE_TASK: &str = "assembleDebug";

/// Android builder for `<root>/mobile-shell/android`.
pub struct AndroidBuilder {
    /// Root directory of the project
    root_dir: PathBuf,
    /// Android shell project directory
    shell_dir: PathBuf,
    /// Gradle wrapper script inside the shell project
    gradlew_path: PathBuf,
    /// `package/.Activity` started after install
    component: String,
    runner: Arc<dyn CommandRunner>,
}

impl AndroidBuilder {
    /// Creates a new Android builder
    ///
    /// # Arguments
    ///
    /// * `root_dir` - Project root containing `mobile-shell/android`
    /// * `runner` - Executes gradle and adb
    pub fn new(root_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        let root_dir = root_dir.into();
        let shell_dir = root_dir.join("mobile-shell").join("android");
        let gradlew = if cfg!(target_os = "windows") {
            "gradlew.bat"
        } else {
            "gradlew"
        };
        let gradlew_path = shell_dir.join(gradlew);

        Self {
            root_dir,
            shell_dir,
            gradlew_path,
            component: DEFAULT_ANDROID_COMPONENT.to_string(),
            runner,
        }
    }

    /// Sets the activity component launched by [`PlatformBuilder::launch_app`]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn gradlew_path(&self) -> &Path {
        &self.gradlew_path
    }

    /// APK lookup: current AGP output path, then the older intermediates path,
    /// then anything under `app/build`.
    pub fn artifact_locator(&self) -> ArtifactLocator {
        let build_dir = self.shell_dir.join("app").join("build");
        ArtifactLocator::new(&build_dir, "apk")
            .candidate(build_dir.join("outputs/apk/debug/app-debug.apk"))
            .candidate(build_dir.join("intermediates/apk/debug/app-debug.apk"))
    }

    /// Maps `tcp:<port>` on the device to the same port on the host
    pub fn setup_port_forwarding(&self, device_id: &str, port: u16) -> Result<(), ShellError> {
        info!("Setting up port forwarding to device/emulator...");
        self.runner
            .run(&self.port_forward_invocation(device_id, port))
            .map_err(|source| ShellError::PortForwardFailed { port, source })
    }

    fn adb(&self, device_id: &str, command: &[&str]) -> ProcessInvocation {
        let mut args = device_selector("-s", device_id);
        args.extend(command.iter().map(|arg| arg.to_string()));
        ProcessInvocation::new("adb", args)
    }

    pub(crate) fn install_invocation(&self, device_id: &str, apk: &Path) -> ProcessInvocation {
        let apk = apk.to_string_lossy().into_owned();
        self.adb(device_id, &["install", "-r", apk.as_str()])
    }

    pub(crate) fn launch_invocation(&self, device_id: &str) -> ProcessInvocation {
        self.adb(device_id, &["shell", "am", "start", "-n", self.component.as_str()])
    }

    pub(crate) fn port_forward_invocation(&self, device_id: &str, port: u16) -> ProcessInvocation {
        let tcp = format!("tcp:{}", port);
        self.adb(device_id, &["reverse", tcp.as_str(), tcp.as_str()])
    }
}

impl PlatformBuilder for AndroidBuilder {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn shell_dir(&self) -> &Path {
        &self.shell_dir
    }

    fn build(&self) -> Result<(), ShellError> {
        info!("Building Android app...");
        ensure_entry_point(
            &self.gradlew_path,
            "Gradle wrapper",
            "Make sure the Android project in mobile-shell/android is set up correctly.",
        )?;

        let invocation = ProcessInvocation::new(
            self.gradlew_path.to_string_lossy(),
            [ASSEMBLE_TASK],
        )
        .in_dir(&self.shell_dir);
        self.runner
            .run(&invocation)
            .map_err(|source| ShellError::BuildFailed {
                target: "android".to_string(),
                source,
            })
    }

    fn install_app(&self, device_id: &str) -> Result<(), ShellError> {
        info!("Installing Android app on device/emulator...");
        let apk = self.artifact_locator().locate()?;
        self.runner
            .run(&self.install_invocation(device_id, &apk))
            .map_err(|source| ShellError::InstallFailed {
                artifact: apk,
                source,
            })
    }

    fn launch_app(&self, device_id: &str) -> Result<(), ShellError> {
        info!("Launching Android app...");
        self.runner
            .run(&self.launch_invocation(device_id))
            .map_err(|source| ShellError::LaunchFailed {
                app: self.component.clone(),
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

    fn builder(root: &Path) -> (AndroidBuilder, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::new());
        (AndroidBuilder::new(root, runner.clone()), runner)
    }

    #[test]
    fn test_android_builder_paths() {
        let (builder, _) = builder(Path::new("/tmp/test-project"));
        assert_eq!(
            builder.shell_dir(),
            Path::new("/tmp/test-project/mobile-shell/android")
        );
        assert!(builder.gradlew_path().starts_with(builder.shell_dir()));
        assert_eq!(builder.platform(), Platform::Android);
    }

    #[test]
    fn build_fails_fast_without_gradle_wrapper() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        let err = builder.build().unwrap_err();
        assert!(matches!(err, ShellError::ToolchainNotFound { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn build_runs_assemble_debug_in_shell_dir() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        fs::create_dir_all(builder.shell_dir()).unwrap();
        fs::write(builder.gradlew_path(), "#!/bin/sh\n").unwrap();

        builder.build().unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["assembleDebug".to_string()]);
        assert_eq!(calls[0].cwd.as_deref(), Some(builder.shell_dir()));
    }

    #[test]
    fn device_selector_omitted_for_empty_id() {
        let (builder, _) = builder(Path::new("/tmp/p"));
        let apk = Path::new("/tmp/p/app-debug.apk");

        assert_eq!(
            builder.install_invocation("", apk).to_string(),
            "adb install -r /tmp/p/app-debug.apk"
        );
        assert_eq!(
            builder.launch_invocation("").to_string(),
            "adb shell am start -n com.example.golangmobile/.MainActivity"
        );
        assert_eq!(
            builder.port_forward_invocation("", 5173).to_string(),
            "adb reverse tcp:5173 tcp:5173"
        );
        for inv in [
            builder.install_invocation("", apk),
            builder.launch_invocation(""),
            builder.port_forward_invocation("", 5173),
        ] {
            assert!(!inv.args.iter().any(|arg| arg == "-s" || arg.is_empty()));
        }
    }

    #[test]
    fn device_selector_present_for_device_id() {
        let (builder, _) = builder(Path::new("/tmp/p"));
        for inv in [
            builder.install_invocation("emulator-5554", Path::new("/a.apk")),
            builder.launch_invocation("emulator-5554"),
            builder.port_forward_invocation("emulator-5554", 3000),
        ] {
            assert_eq!(inv.program, "adb");
            assert_eq!(&inv.args[..2], &["-s".to_string(), "emulator-5554".to_string()]);
        }
    }

    #[test]
    fn install_without_apk_is_artifact_not_found() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        let err = builder.install_app("").unwrap_err();
        assert!(matches!(err, ShellError::ArtifactNotFound { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn install_uses_located_apk() {
        let dir = TempDir::new().unwrap();
        let (builder, runner) = builder(dir.path());
        let apk = builder
            .shell_dir()
            .join("app/build/intermediates/apk/debug/app-debug.apk");
        fs::create_dir_all(apk.parent().unwrap()).unwrap();
        fs::write(&apk, b"apk").unwrap();

        builder.install_app("emulator-5554").unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.last().unwrap(), &apk.to_string_lossy().to_string());
    }

    #[test]
    fn launch_uses_custom_component() {
        let (builder, runner) = builder(Path::new("/tmp/p"));
        let builder = builder.component("dev.example.shell/.WebActivity");
        builder.launch_app("").unwrap();
        assert_eq!(
            runner.commands(),
            vec!["adb shell am start -n dev.example.shell/.WebActivity".to_string()]
        );
    }

    #[test]
    fn port_forward_failure_is_reported() {
        let (builder, runner) = builder(Path::new("/tmp/p"));
        runner.fail_when(|inv| inv.args.contains(&"reverse".to_string()));
        let err = builder.setup_port_forwarding("emulator-5554", 5173).unwrap_err();
        assert!(matches!(err, ShellError::PortForwardFailed { port: 5173, .. }));
    }
}
