//! Web frontend driver.
//!
//! Runs the frontend's npm scripts in `<root>/frontend` and moves the
//! production bundle (`dist/`) into the native shell projects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::builders::common::replace_dir;
use crate::process::{CommandRunner, ProcessHandle, ProcessInvocation};
use crate::types::{Platform, ShellError, StepOutcome};

/// Bundle location inside the Android shell project.
const ANDROID_WEB_ASSETS: &str = "app/src/main/assets/www";

/// Bundle location inside the iOS shell project.
const IOS_WEB_ASSETS: &str = "App/www";

/// Drives the frontend's dev server, production build and asset copy.
pub struct FrontendDriver {
    root_dir: PathBuf,
    frontend_dir: PathBuf,
    dev_port: u16,
    runner: Arc<dyn CommandRunner>,
}

impl FrontendDriver {
    pub fn new(root_dir: impl Into<PathBuf>, dev_port: u16, runner: Arc<dyn CommandRunner>) -> Self {
        let root_dir = root_dir.into();
        let frontend_dir = root_dir.join("frontend");
        Self {
            root_dir,
            frontend_dir,
            dev_port,
            runner,
        }
    }

    pub fn frontend_dir(&self) -> &Path {
        &self.frontend_dir
    }

    /// Production bundle directory written by `npm run build`.
    pub fn dist_dir(&self) -> PathBuf {
        self.frontend_dir.join("dist")
    }

    /// Where the bundle is copied for `platform`.
    pub fn asset_dir(&self, platform: Platform) -> Option<PathBuf> {
        let shell = self.root_dir.join("mobile-shell");
        match platform {
            Platform::Android => Some(shell.join("android").join(ANDROID_WEB_ASSETS)),
            Platform::Ios => Some(shell.join("ios").join(IOS_WEB_ASSETS)),
            Platform::Web => None,
        }
    }

    /// Spawns the dev server and returns without waiting for it.
    pub fn start_dev_server(&self) -> Result<ProcessHandle, ShellError> {
        info!("Starting frontend dev server on port {}...", self.dev_port);
        let port = self.dev_port.to_string();
        let invocation =
            ProcessInvocation::new("npm", ["run", "dev", "--", "--port", port.as_str()])
                .in_dir(&self.frontend_dir);
        self.runner
            .spawn(&invocation)
            .map_err(ShellError::DevServerFailed)
    }

    /// Runs the production build to completion, installing dependencies first
    /// when `node_modules` is missing.
    pub fn build(&self) -> Result<(), ShellError> {
        info!("Building frontend...");
        let build_failed = |source| ShellError::BuildFailed {
            target: "frontend".to_string(),
            source,
        };

        if !self.frontend_dir.join("node_modules").exists() {
            info!("Installing npm dependencies...");
            let install = ProcessInvocation::new("npm", ["install"]).in_dir(&self.frontend_dir);
            self.runner.run(&install).map_err(build_failed)?;
        }

        let build = ProcessInvocation::new("npm", ["run", "build"]).in_dir(&self.frontend_dir);
        self.runner.run(&build).map_err(build_failed)
    }

    /// Copies `dist/` into every shell project present on disk.
    ///
    /// Earlier copies are replaced, never merged. Shell projects that do not
    /// exist are skipped with a warning.
    pub fn copy_build_to_mobile(&self) -> Result<Vec<(Platform, StepOutcome)>, ShellError> {
        info!("Copying frontend build to mobile shells...");
        let dist = self.dist_dir();
        if !dist.is_dir() {
            return Err(ShellError::CopyFailed {
                from: dist,
                to: self.root_dir.join("mobile-shell"),
                reason: "frontend build output is missing; run the frontend build first"
                    .to_string(),
            });
        }

        let mut outcomes = Vec::new();
        for platform in [Platform::Android, Platform::Ios] {
            let Some(dest) = self.asset_dir(platform) else {
                continue;
            };
            let shell_dir = self.root_dir.join("mobile-shell").join(platform.as_str());
            if !shell_dir.is_dir() {
                let reason = format!("{} shell project not found at {}", platform, shell_dir.display());
                warn!("Skipping copy: {}", reason);
                outcomes.push((platform, StepOutcome::skipped(reason)));
                continue;
            }

            replace_dir(&dist, &dest)?;
            info!("Copied {} -> {}", dist.display(), dest.display());
            outcomes.push((platform, StepOutcome::Done));
        }
        Ok(outcomes)
    }
}
