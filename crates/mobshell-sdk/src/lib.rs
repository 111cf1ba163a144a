//! Hybrid mobile app orchestration SDK
//!
//! `mobshell-sdk` drives the toolchains needed to ship a web frontend inside
//! native Android and iOS shells: the frontend's npm scripts, Gradle, `adb`,
//! `xcodebuild`, `xcrun simctl` and the Expo/EAS CLIs. It runs them in the
//! right order with the right arguments, finds the artifacts they produce
//! and reports which step failed when something goes wrong.
//!
//! # Project layout
//!
//! ```text
//! <root>/
//! ├── frontend/                 # npm project; `npm run build` writes dist/
//! └── mobile-shell/
//!     ├── android/              # Gradle project with gradlew
//!     └── ios/                  # App.xcodeproj
//! ```
//!
//! # Architecture
//!
//! - **Orchestrator**: selects the dev/build flow and sequences the steps
//! - **Builders**: per-platform build, install and launch
//! - **Frontend / Expo drivers**: npm, Expo and EAS invocations
//! - **Preview server**: serves the frontend build locally
//! - **Process runner**: the single seam every external command goes through
//!
//! # Example
//!
//! ```no_run
//! use mobshell_sdk::{BuildConfiguration, Orchestrator};
//!
//! fn main() -> Result<(), mobshell_sdk::OrchestrationError> {
//!     let config = BuildConfiguration {
//!         build_android: true,
//!         preview: true,
//!         device_id: "emulator-5554".to_string(),
//!         ..BuildConfiguration::new(".")
//!     };
//!
//!     Orchestrator::new(config).run()
//! }
//! ```

pub mod artifact;
pub mod builders;
pub mod expo;
pub mod frontend;
pub mod orchestrator;
pub mod preview;
pub mod process;
pub mod types;

pub use artifact::ArtifactLocator;
pub use builders::{AndroidBuilder, IosBuilder, PlatformBuilder};
pub use expo::{EasConfig, ExpoDriver};
pub use frontend::FrontendDriver;
pub use orchestrator::{DevSession, Orchestrator};
pub use preview::{PreviewHandle, PreviewServer};
pub use process::{CommandRunner, ProcessError, ProcessHandle, ProcessInvocation, SystemRunner};
pub use types::{
    BuildConfiguration, DEFAULT_DEV_PORT, DEFAULT_PREVIEW_PORT, OrchestrationError, Platform,
    Runtime, ShellError, Step, StepContext, StepOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
