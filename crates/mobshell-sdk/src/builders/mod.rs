//! Native shell project builders.
//!
//! One builder per platform, both rooted at `<root>/mobile-shell/<platform>`:
//!
//! | Builder | Platform | Toolchain | Artifact |
//! |---------|----------|-----------|----------|
//! | [`AndroidBuilder`] | Android | Gradle wrapper + `adb` | debug APK |
//! | [`IosBuilder`] | iOS | `xcodebuild` + `xcrun simctl` | simulator `.app` |
//!
//! Builders hold only paths fixed at construction and a shared
//! [`CommandRunner`](crate::process::CommandRunner); they never read the
//! process working directory.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mobshell_sdk::builders::{AndroidBuilder, PlatformBuilder};
//! use mobshell_sdk::process::SystemRunner;
//!
//! let android = AndroidBuilder::new("/path/to/project", Arc::new(SystemRunner::new()));
//! android.build()?;
//! android.setup_port_forwarding("emulator-5554", 5173)?;
//! android.install_app("emulator-5554")?;
//! android.launch_app("emulator-5554")?;
//! # Ok::<(), mobshell_sdk::ShellError>(())
//! ```

use std::path::Path;

use crate::types::{Platform, ShellError};

pub mod android;
pub mod common;
pub mod ios;

pub use android::AndroidBuilder;
pub use ios::IosBuilder;

/// Build, install and launch operations shared by every platform.
///
/// Device identifiers may be empty, in which case the device tool picks
/// its default target.
pub trait PlatformBuilder {
    fn platform(&self) -> Platform;

    /// Native shell project directory.
    fn shell_dir(&self) -> &Path;

    /// Builds the debug app after checking the build entry point exists.
    fn build(&self) -> Result<(), ShellError>;

    /// Locates the packaged app and installs it on the device.
    fn install_app(&self, device_id: &str) -> Result<(), ShellError>;

    /// Starts the installed app on the device.
    fn launch_app(&self, device_id: &str) -> Result<(), ShellError>;
}
