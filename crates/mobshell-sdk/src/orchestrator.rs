//! Build and preview orchestration.
//!
//! [`Orchestrator::run`] picks one of four flows from the configuration:
//!
//! | Runtime | Mode  | Flow |
//! |---------|-------|------|
//! | webview | dev   | dev server, then device preview (lenient) or local preview server; wait for Ctrl+C |
//! | webview | build | frontend build, copy, native builds, device preview (strict) |
//! | expo    | dev   | Expo setup, then the Expo dev server in the foreground |
//! | expo    | build | Expo setup, then one EAS build per selected platform |
//!
//! Steps run strictly in order and every error leaving this module names
//! the step that failed.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::builders::{AndroidBuilder, IosBuilder, PlatformBuilder};
use crate::expo::ExpoDriver;
use crate::frontend::FrontendDriver;
use crate::preview::{PreviewHandle, PreviewServer};
use crate::process::{CommandRunner, ProcessError, ProcessHandle, SystemRunner};
use crate::types::{
    BuildConfiguration, OrchestrationError, Platform, Runtime, ShellError, Step, StepContext,
    StepOutcome,
};

/// How often a waiting dev session checks that its dev server is alive.
const DEV_SERVER_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the configuration and every driver for one run.
pub struct Orchestrator {
    config: BuildConfiguration,
    frontend: FrontendDriver,
    android: AndroidBuilder,
    ios: IosBuilder,
    expo: ExpoDriver,
    preview: PreviewServer,
}

impl Orchestrator {
    /// Creates an orchestrator that runs real commands.
    pub fn new(config: BuildConfiguration) -> Self {
        let runner = Arc::new(SystemRunner::new().with_timeout(config.command_timeout));
        Self::with_runner(config, runner)
    }

    /// Creates an orchestrator on top of an arbitrary [`CommandRunner`].
    pub fn with_runner(config: BuildConfiguration, runner: Arc<dyn CommandRunner>) -> Self {
        let root = config.root_dir.clone();
        let frontend = FrontendDriver::new(&root, config.dev_port, runner.clone());
        let android =
            AndroidBuilder::new(&root, runner.clone()).component(config.android_component.clone());
        let ios = IosBuilder::new(&root, runner.clone())
            .scheme(config.ios_scheme.clone())
            .bundle_id(config.ios_bundle_id.clone());
        let expo = ExpoDriver::new(&root, runner);
        let preview = PreviewServer::new(frontend.dist_dir(), config.preview_port);

        Self {
            config,
            frontend,
            android,
            ios,
            expo,
            preview,
        }
    }

    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    pub fn frontend(&self) -> &FrontendDriver {
        &self.frontend
    }

    pub fn android(&self) -> &AndroidBuilder {
        &self.android
    }

    pub fn ios(&self) -> &IosBuilder {
        &self.ios
    }

    pub fn expo(&self) -> &ExpoDriver {
        &self.expo
    }

    /// Runs the flow selected by the configuration.
    ///
    /// In webview dev mode this blocks until Ctrl+C.
    pub fn run(&self) -> Result<(), OrchestrationError> {
        match (self.config.runtime, self.config.dev_mode) {
            (Runtime::Webview, true) => self.start_dev_session()?.wait(),
            (Runtime::Webview, false) => self.run_build_mode(),
            (Runtime::Expo, true) => self.run_expo_dev(),
            (Runtime::Expo, false) => self.run_expo_build(),
        }
    }

    /// Starts the dev server and either device preview or the local preview
    /// server, then returns without waiting.
    pub fn start_dev_session(&self) -> Result<DevSession, OrchestrationError> {
        info!("Running in development mode...");
        let dev_server = self.frontend.start_dev_server().step(Step::DevServer)?;

        let preview = if self.config.preview {
            if let Err(e) = self.preview_on_device() {
                warn!("Preview setup issue: {}", e);
            }
            None
        } else {
            Some(self.preview.start().step(Step::PreviewServer)?)
        };

        Ok(DevSession {
            dev_server,
            preview,
        })
    }

    /// Production build: frontend, copy, native builds, optional device preview.
    pub fn run_build_mode(&self) -> Result<(), OrchestrationError> {
        info!("Running in build mode...");
        self.frontend.build().step(Step::FrontendBuild)?;
        self.frontend.copy_build_to_mobile().step(Step::CopyBuild)?;

        if self.config.build_android {
            self.android.build().step(Step::AndroidBuild)?;
        }
        if self.config.build_ios {
            self.ios.build().step(Step::IosBuild)?;
        }

        if self.config.preview {
            self.preview_on_device()?;
        }

        info!("Build process completed successfully!");
        Ok(())
    }

    /// Installs and launches the app on the preview platform.
    ///
    /// Android is forwarded the dev server port first when a device is named.
    pub fn preview_on_device(&self) -> Result<StepOutcome, OrchestrationError> {
        let Some(platform) = self.config.preview_platform() else {
            let reason = "no platform selected for device preview (use --android or --ios)";
            warn!("{}", reason);
            return Ok(StepOutcome::skipped(reason));
        };

        let device_id = self.config.device_id.as_str();
        let (builder, install, launch): (&dyn PlatformBuilder, Step, Step) = match platform {
            Platform::Android => {
                if !device_id.trim().is_empty() {
                    self.android
                        .setup_port_forwarding(device_id, self.config.dev_port)
                        .step(Step::PortForward)?;
                }
                (&self.android, Step::AndroidInstall, Step::AndroidLaunch)
            }
            Platform::Ios => (&self.ios, Step::IosInstall, Step::IosLaunch),
            Platform::Web => {
                return Ok(StepOutcome::skipped("web has no device preview"));
            }
        };

        builder.install_app(device_id).step(install)?;
        builder.launch_app(device_id).step(launch)?;
        Ok(StepOutcome::Done)
    }

    fn run_expo_dev(&self) -> Result<(), OrchestrationError> {
        info!("Running Expo in development mode...");
        self.expo.setup().step(Step::ExpoSetup)?;
        let platform = self.config.preview_platform().unwrap_or(Platform::Web);
        self.expo
            .start_dev_server(Some(platform))
            .step(Step::ExpoDevServer)
    }

    fn run_expo_build(&self) -> Result<(), OrchestrationError> {
        info!("Running Expo build...");
        self.expo.setup().step(Step::ExpoSetup)?;

        let platforms = self.config.platforms();
        if platforms.is_empty() {
            warn!("No platform selected for the Expo build (use --android or --ios)");
        }
        for platform in platforms {
            self.expo.build_app(platform).step(Step::ExpoBuild)?;
        }
        Ok(())
    }
}

/// Background processes of a running dev session.
///
/// Dropping the session stops the dev server and the preview server.
#[derive(Debug)]
pub struct DevSession {
    dev_server: ProcessHandle,
    preview: Option<PreviewHandle>,
}

impl DevSession {
    pub fn dev_server(&self) -> &ProcessHandle {
        &self.dev_server
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Blocks until Ctrl+C.
    ///
    /// A dev server that exits cleanly is only reported; the preview server
    /// keeps running. One that fails ends the session with a
    /// [`Step::DevServer`] error.
    pub fn wait(self) -> Result<(), OrchestrationError> {
        let (tx, rx) = mpsc::channel();
        if let Err(e) = ctrlc::set_handler(move || {
            let _ = tx.send(());
        }) {
            warn!("Could not install Ctrl+C handler: {}", e);
        }

        info!("Press Ctrl+C to stop");
        self.wait_until(&rx)
    }

    /// [`wait`](Self::wait) with interrupts delivered on `interrupts`.
    pub(crate) fn wait_until(
        mut self,
        interrupts: &mpsc::Receiver<()>,
    ) -> Result<(), OrchestrationError> {
        let mut watching = self.dev_server.id().is_some();
        loop {
            match interrupts.recv_timeout(DEV_SERVER_CHECK_INTERVAL) {
                Ok(()) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                // No handler installed; the session ends with the process.
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    thread::sleep(DEV_SERVER_CHECK_INTERVAL)
                }
            }

            if !watching {
                continue;
            }
            let Some(status) = self.dev_server.try_status() else {
                continue;
            };
            // An exit observed together with an interrupt is the interrupt.
            if interrupts.try_recv().is_ok() {
                break;
            }
            if status.success() {
                warn!(
                    "Dev server `{}` exited; press Ctrl+C to stop",
                    self.dev_server.description()
                );
                watching = false;
                continue;
            }

            let err = ProcessError::Failed {
                command: self.dev_server.description().to_string(),
                code: status.code(),
            };
            self.shutdown();
            return Err(OrchestrationError::new(
                Step::DevServer,
                ShellError::DevServerFailed(err),
            ));
        }

        info!("Shutting down...");
        self.shutdown();
        Ok(())
    }

    /// Stops the preview server and the dev server.
    pub fn shutdown(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.stop();
        }
        self.dev_server.stop();
    }
}
