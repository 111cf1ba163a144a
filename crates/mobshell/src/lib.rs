//! # mobshell
//!
//! Command-line tool for building and previewing hybrid mobile apps: a web
//! frontend packaged into native Android and iOS shells, or an Expo app.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter config file
//! mobshell init
//!
//! # Dev server with a local preview at http://127.0.0.1:8080
//! mobshell dev
//!
//! # Dev server, app installed and launched on an emulator
//! mobshell dev --android --preview --device emulator-5554
//!
//! # Production build of both shells
//! mobshell build --android --ios
//!
//! # Expo: EAS cloud build for Android
//! mobshell --runtime expo build --android
//! ```
//!
//! ## Project layout
//!
//! ```text
//! <root>/
//! ├── mobshell.toml
//! ├── .env.local
//! ├── frontend/
//! └── mobile-shell/
//!     ├── android/
//!     └── ios/
//! ```
//!
//! ## Global Flags
//!
//! - `--root <DIR>` - Project root (env `MOBSHELL_ROOT`)
//! - `--dev-port <N>` / `--preview-port <N>` - Server ports (env `MOBSHELL_DEV_PORT`, `MOBSHELL_PREVIEW_PORT`)
//! - `--runtime webview|expo` - Which build path to drive
//! - `--timeout-secs <N>` - Kill any single external command after N seconds
//! - `--config <PATH>` - Use this config file instead of discovering `mobshell.toml`
//! - `-v, --verbose` - Log every command invocation

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use mobshell_sdk::{BuildConfiguration, DEFAULT_DEV_PORT, DEFAULT_PREVIEW_PORT, Orchestrator};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub mod config;

use config::{CONFIG_FILE_NAME, ConfigResolver, MobshellConfig, RuntimeSetting};

/// Build and preview orchestrator for hybrid web/native mobile apps.
#[derive(Parser, Debug)]
#[command(name = "mobshell", author, version, about = "Build and preview hybrid mobile apps", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default, Clone)]
struct GlobalArgs {
    /// Project root containing frontend/ and mobile-shell/
    #[arg(long, global = true, env = "MOBSHELL_ROOT")]
    root: Option<PathBuf>,

    /// Frontend dev server port [default: 5173]
    #[arg(long, global = true, env = "MOBSHELL_DEV_PORT")]
    dev_port: Option<u16>,

    /// Local preview server port [default: 8080]
    #[arg(long, global = true, env = "MOBSHELL_PREVIEW_PORT")]
    preview_port: Option<u16>,

    /// Build path to drive [default: webview]
    #[arg(long, global = true, value_enum)]
    runtime: Option<RuntimeSetting>,

    /// Kill any single external command after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Config file to use instead of discovering mobshell.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the frontend dev server and preview it locally or on a device.
    Dev(TargetArgs),
    /// Build the frontend and the selected native shells.
    Build(TargetArgs),
    /// Write a starter mobshell.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct TargetArgs {
    /// Build (and preview on) the Android shell
    #[arg(long)]
    android: bool,

    /// Build (and preview on) the iOS shell
    #[arg(long)]
    ios: bool,

    /// Install and launch the app on a device, emulator or simulator
    #[arg(long)]
    preview: bool,

    /// Device identifier passed to adb/simctl
    #[arg(long, env = "MOBSHELL_DEVICE")]
    device: Option<String>,
}

pub fn run() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Command::Init { output } => cmd_init(&output),
        Command::Dev(targets) => {
            let config = resolve_configuration(&cli.global, &targets, true)?;
            cmd_orchestrate(config)
        }
        Command::Build(targets) => {
            let config = resolve_configuration(&cli.global, &targets, false)?;
            cmd_orchestrate(config)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Merges CLI flags, environment and `mobshell.toml` into one configuration.
fn resolve_configuration(
    global: &GlobalArgs,
    targets: &TargetArgs,
    dev_mode: bool,
) -> Result<BuildConfiguration> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let start_dir = global.root.clone().unwrap_or_else(|| cwd.clone());
    let resolver = ConfigResolver::load(global.config.as_deref(), &start_dir)?;
    if let Some(path) = &resolver.config_path {
        tracing::debug!("Using config file {:?}", path);
    }

    build_configuration(&resolver, global, targets, dev_mode, &cwd)
}

fn build_configuration(
    resolver: &ConfigResolver,
    global: &GlobalArgs,
    targets: &TargetArgs,
    dev_mode: bool,
    cwd: &Path,
) -> Result<BuildConfiguration> {
    let root_dir = resolver.root_dir(global.root.clone(), cwd);
    if !root_dir.is_dir() {
        bail!("project root {:?} is not a directory", root_dir);
    }

    let runtime = resolver.resolve(
        global.runtime,
        |c| c.project.runtime,
        RuntimeSetting::default(),
    );
    let device_id = resolver.resolve(targets.device.clone(), |c| c.device.id.clone(), String::new());
    let timeout_secs = global
        .timeout_secs
        .or_else(|| resolver.config.as_ref().and_then(|c| c.build.timeout_secs));
    let android = resolver.android();
    let ios = resolver.ios();

    Ok(BuildConfiguration {
        root_dir,
        dev_mode,
        build_android: targets.android,
        build_ios: targets.ios,
        preview: targets.preview,
        device_id,
        dev_port: resolver.resolve(global.dev_port, |c| c.dev.port, DEFAULT_DEV_PORT),
        preview_port: resolver.resolve(
            global.preview_port,
            |c| c.dev.preview_port,
            DEFAULT_PREVIEW_PORT,
        ),
        runtime: runtime.into(),
        command_timeout: timeout_secs.map(Duration::from_secs),
        android_component: android.component,
        ios_scheme: ios.scheme,
        ios_bundle_id: ios.bundle_id,
    })
}

fn cmd_orchestrate(config: BuildConfiguration) -> Result<()> {
    let dev_mode = config.dev_mode;
    println!("Project root: {:?}", config.root_dir);
    if !config.device_id.is_empty() {
        println!("Device: {}", config.device_id);
    }
    if config.preview && config.preview_platform().is_none() {
        println!("Note: --preview needs --android or --ios to pick a device platform");
    }

    Orchestrator::new(config).run()?;

    if dev_mode {
        println!("Development session stopped");
    } else {
        println!("Build process completed successfully!");
    }
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    ensure_can_write(output)?;
    write_file(output, MobshellConfig::generate_starter_toml().as_bytes())?;
    println!("Wrote starter config to {:?}", output);
    Ok(())
}

fn load_dotenv() {
    if let Ok(root) = project_root() {
        let path = root.join(".env.local");
        let _ = dotenvy::from_path(path);
    }
}

/// Nearest ancestor of the current directory that looks like a mobshell
/// project, else the current directory.
fn project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("resolving project root from current directory")?;
    Ok(find_project_root(&cwd).unwrap_or(cwd))
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(|root| root.to_path_buf())
}

fn is_project_root(candidate: &Path) -> bool {
    candidate.join(CONFIG_FILE_NAME).is_file() || candidate.join("mobile-shell").is_dir()
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
}
