//! Core types for mobshell-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`ShellError`] - Error taxonomy for toolchain, build and device operations
//! - [`OrchestrationError`] - A [`ShellError`] tagged with the [`Step`] that produced it
//! - [`Platform`] - Target platform selection (Android, iOS, or web)
//! - [`BuildConfiguration`] - Resolved, immutable run configuration
//! - [`StepOutcome`] - Result of best-effort steps that may be skipped

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::process::ProcessError;

/// Default Android component launched after install.
pub const DEFAULT_ANDROID_COMPONENT: &str = "com.example.golangmobile/.MainActivity";

/// Default iOS bundle identifier launched after install.
pub const DEFAULT_IOS_BUNDLE_ID: &str = "com.example.golangmobile";

/// Default Xcode scheme (and product name) of the iOS shell project.
pub const DEFAULT_IOS_SCHEME: &str = "App";

/// Default port of the frontend development server.
pub const DEFAULT_DEV_PORT: u16 = 5173;

/// Default port of the local preview server.
pub const DEFAULT_PREVIEW_PORT: u16 = 8080;

/// Error types for mobshell-sdk operations.
///
/// Failures of the underlying external tool are kept as the error source
/// ([`ProcessError`]) so the exit status or timeout stays visible in the chain.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// A prerequisite binary, script or project file is missing.
    #[error("{tool} not found at {path:?}. {hint}")]
    ToolchainNotFound {
        tool: String,
        path: PathBuf,
        hint: String,
    },

    /// The underlying build tool failed or could not be started.
    #[error("{target} build failed")]
    BuildFailed {
        target: String,
        #[source]
        source: ProcessError,
    },

    /// No installable artifact was found after the direct and recursive search.
    #[error("no {extension} artifact found in {searched:?}. Run the platform build first")]
    ArtifactNotFound { extension: String, searched: PathBuf },

    /// The device install command failed.
    #[error("installing {artifact:?} failed")]
    InstallFailed {
        artifact: PathBuf,
        #[source]
        source: ProcessError,
    },

    /// The device launch command failed.
    #[error("launching {app} failed")]
    LaunchFailed {
        app: String,
        #[source]
        source: ProcessError,
    },

    /// Reverse port forwarding to the device failed.
    #[error("forwarding tcp:{port} to the device failed")]
    PortForwardFailed {
        port: u16,
        #[source]
        source: ProcessError,
    },

    /// The build-service configuration file could not be written or read back.
    #[error("writing config file {path:?} failed: {reason}")]
    ConfigWriteFailed { path: PathBuf, reason: String },

    /// The requested platform is not supported by the operation.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The development server could not be started.
    #[error("dev server failed to start")]
    DevServerFailed(#[source] ProcessError),

    /// Copying the frontend build output into a shell project failed.
    #[error("copying {from:?} to {to:?} failed: {reason}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// A required setup step (dependency or CLI install) failed.
    #[error("{what} failed")]
    SetupFailed {
        what: String,
        #[source]
        source: ProcessError,
    },

    /// The local preview server could not be started.
    #[error("preview server failed: {0}")]
    PreviewServerFailed(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named step of an orchestration run.
///
/// Every error leaving the orchestrator is tagged with the step that
/// produced it so the user can see where the sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FrontendBuild,
    CopyBuild,
    DevServer,
    PreviewServer,
    AndroidBuild,
    IosBuild,
    PortForward,
    AndroidInstall,
    AndroidLaunch,
    IosInstall,
    IosLaunch,
    ExpoSetup,
    ExpoDevServer,
    ExpoBuild,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::FrontendBuild => "frontend build",
            Step::CopyBuild => "copying build output",
            Step::DevServer => "starting dev server",
            Step::PreviewServer => "starting preview server",
            Step::AndroidBuild => "android build",
            Step::IosBuild => "iOS build",
            Step::PortForward => "port forwarding",
            Step::AndroidInstall => "android app installation",
            Step::AndroidLaunch => "android app launch",
            Step::IosInstall => "iOS app installation",
            Step::IosLaunch => "iOS app launch",
            Step::ExpoSetup => "expo setup",
            Step::ExpoDevServer => "expo dev server",
            Step::ExpoBuild => "expo build",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`ShellError`] wrapped with the step that produced it.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct OrchestrationError {
    pub step: Step,
    #[source]
    pub source: ShellError,
}

impl OrchestrationError {
    pub fn new(step: Step, source: ShellError) -> Self {
        Self { step, source }
    }
}

/// Extension for tagging SDK results with an orchestration [`Step`].
pub trait StepContext<T> {
    fn step(self, step: Step) -> Result<T, OrchestrationError>;
}

impl<T> StepContext<T> for Result<T, ShellError> {
    fn step(self, step: Step) -> Result<T, OrchestrationError> {
        self.map_err(|source| OrchestrationError::new(step, source))
    }
}

/// Target platform.
///
/// # Example
///
/// ```
/// use mobshell_sdk::Platform;
///
/// let platform: Platform = "android".parse().unwrap();
/// assert_eq!(platform, Platform::Android);
/// assert!("windows-phone".parse::<Platform>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Android shell project (APK).
    Android,
    /// iOS shell project (simulator `.app` bundle).
    Ios,
    /// Browser target, only meaningful for the Expo dev server.
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            other => Err(ShellError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Which frontend/build path the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    /// Web frontend bundled into native WebView shells built with Gradle/Xcode.
    #[default]
    Webview,
    /// Expo dev server and EAS cloud builds.
    Expo,
}

/// Outcome of a step that is allowed to be skipped.
///
/// Used together with `Result` to express succeeded / skipped-with-warning /
/// failed without swallowing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped { reason: String },
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }
}

/// Resolved configuration for one run.
///
/// Built once by the CLI and never mutated afterwards.
///
/// # Example
///
/// ```
/// use mobshell_sdk::{BuildConfiguration, Platform};
///
/// let config = BuildConfiguration {
///     build_android: true,
///     build_ios: true,
///     preview: true,
///     ..BuildConfiguration::new("/tmp/app")
/// };
/// assert_eq!(config.preview_platform(), Some(Platform::Android));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Project root containing `frontend/` and `mobile-shell/`.
    pub root_dir: PathBuf,
    /// Development mode (dev server + preview) instead of a production build.
    pub dev_mode: bool,
    pub build_android: bool,
    pub build_ios: bool,
    /// Install and launch on a device/emulator/simulator.
    pub preview: bool,
    /// Device identifier; empty means "let the device tool pick".
    pub device_id: String,
    pub dev_port: u16,
    pub preview_port: u16,
    pub runtime: Runtime,
    /// Upper bound for every blocking external command.
    pub command_timeout: Option<Duration>,
    pub android_component: String,
    pub ios_scheme: String,
    pub ios_bundle_id: String,
}

impl BuildConfiguration {
    /// Creates a configuration with defaults for everything but the root.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            dev_mode: false,
            build_android: false,
            build_ios: false,
            preview: false,
            device_id: String::new(),
            dev_port: DEFAULT_DEV_PORT,
            preview_port: DEFAULT_PREVIEW_PORT,
            runtime: Runtime::Webview,
            command_timeout: None,
            android_component: DEFAULT_ANDROID_COMPONENT.to_string(),
            ios_scheme: DEFAULT_IOS_SCHEME.to_string(),
            ios_bundle_id: DEFAULT_IOS_BUNDLE_ID.to_string(),
        }
    }

    /// Platform used for device preview. Android wins when both are set.
    pub fn preview_platform(&self) -> Option<Platform> {
        if !self.preview {
            None
        } else if self.build_android {
            Some(Platform::Android)
        } else if self.build_ios {
            Some(Platform::Ios)
        } else {
            None
        }
    }

    /// Platforms selected for building, Android first.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.build_android {
            platforms.push(Platform::Android);
        }
        if self.build_ios {
            platforms.push(Platform::Ios);
        }
        platforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_platform_prefers_android() {
        let config = BuildConfiguration {
            build_android: true,
            build_ios: true,
            preview: true,
            ..BuildConfiguration::new("/tmp/app")
        };
        assert_eq!(config.preview_platform(), Some(Platform::Android));
    }

    #[test]
    fn preview_platform_requires_preview_flag() {
        let config = BuildConfiguration {
            build_ios: true,
            ..BuildConfiguration::new("/tmp/app")
        };
        assert_eq!(config.preview_platform(), None);

        let config = BuildConfiguration {
            preview: true,
            ..config
        };
        assert_eq!(config.preview_platform(), Some(Platform::Ios));
    }

    #[test]
    fn platforms_are_ordered() {
        let config = BuildConfiguration {
            build_android: true,
            build_ios: true,
            ..BuildConfiguration::new("/tmp/app")
        };
        assert_eq!(config.platforms(), vec![Platform::Android, Platform::Ios]);
        assert!(BuildConfiguration::new("/tmp/app").platforms().is_empty());
    }

    #[test]
    fn parses_platform_names() {
        assert_eq!(" iOS ".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("web".parse::<Platform>().unwrap(), Platform::Web);
        let err = "tizen".parse::<Platform>().unwrap_err();
        assert!(matches!(err, ShellError::UnsupportedPlatform(ref p) if p == "tizen"));
    }

    #[test]
    fn orchestration_error_names_step() {
        let err = OrchestrationError::new(
            Step::AndroidBuild,
            ShellError::UnsupportedPlatform("web".into()),
        );
        assert_eq!(
            err.to_string(),
            "android build failed: unsupported platform: web"
        );
    }
}
