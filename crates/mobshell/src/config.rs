//! Configuration file support for mobshell.
//!
//! `mobshell.toml` persists project settings so they don't have to be passed
//! as flags on every run.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The project root given with `--root` (or the current directory)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! `--config` skips discovery and loads the given file.
//!
//! ## Precedence
//!
//! CLI flags > `MOBSHELL_*` environment variables > `mobshell.toml` > defaults
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! root = "."
//! runtime = "webview"
//!
//! [dev]
//! port = 5173
//! preview_port = 8080
//!
//! [device]
//! id = "emulator-5554"
//!
//! [android]
//! component = "com.example.golangmobile/.MainActivity"
//!
//! [ios]
//! scheme = "App"
//! bundle_id = "com.example.golangmobile"
//!
//! [build]
//! timeout_secs = 1800
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use mobshell_sdk::types::{DEFAULT_ANDROID_COMPONENT, DEFAULT_IOS_BUNDLE_ID, DEFAULT_IOS_SCHEME};
use mobshell_sdk::{DEFAULT_DEV_PORT, DEFAULT_PREVIEW_PORT, Runtime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "mobshell.toml";

/// Frontend/build path selectable from the CLI and the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSetting {
    /// Web frontend inside native WebView shells
    #[default]
    Webview,
    /// Expo dev server and EAS builds
    Expo,
}

impl From<RuntimeSetting> for Runtime {
    fn from(setting: RuntimeSetting) -> Self {
        match setting {
            RuntimeSetting::Webview => Runtime::Webview,
            RuntimeSetting::Expo => Runtime::Expo,
        }
    }
}

/// Root configuration structure for `mobshell.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MobshellConfig {
    pub project: ProjectConfig,
    pub dev: DevConfig,
    pub device: DeviceConfig,
    pub android: AndroidConfig,
    pub ios: IosConfig,
    pub build: BuildSection,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root containing `frontend/` and `mobile-shell/`.
    ///
    /// Relative paths are resolved against the directory of the config file.
    pub root: Option<PathBuf>,

    pub runtime: Option<RuntimeSetting>,
}

/// Development server ports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    pub port: Option<u16>,
    pub preview_port: Option<u16>,
}

/// Default device/emulator/simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: Option<String>,
}

/// Android-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Activity started after install, as `package/.Activity`.
    ///
    /// Defaults to "com.example.golangmobile/.MainActivity".
    pub component: String,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            component: DEFAULT_ANDROID_COMPONENT.to_string(),
        }
    }
}

/// iOS-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IosConfig {
    /// Xcode scheme; the project is expected at `<scheme>.xcodeproj`.
    pub scheme: String,

    /// Bundle identifier launched on the simulator.
    pub bundle_id: String,
}

impl Default for IosConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_IOS_SCHEME.to_string(),
            bundle_id: DEFAULT_IOS_BUNDLE_ID.to_string(),
        }
    }
}

/// Build execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Upper bound in seconds for each blocking external command.
    pub timeout_secs: Option<u64>,
}

impl MobshellConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: MobshellConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Finds and loads `mobshell.toml` starting from `start_dir` and walking up.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// Every setting is commented out at its default so the file documents
    /// itself without changing behavior.
    pub fn generate_starter_toml() -> String {
        format!(
            r#"# mobshell configuration file
# CLI flags and MOBSHELL_* environment variables override these settings.

[project]
# Project root containing frontend/ and mobile-shell/ (relative to this file)
# root = "."

# webview: bundle the frontend into the native shells (default)
# expo:    use the Expo dev server and EAS builds
# runtime = "webview"

[dev]
# Frontend dev server port (default: {dev_port})
# port = {dev_port}

# Local preview server port (default: {preview_port})
# preview_port = {preview_port}

[device]
# Device, emulator or simulator to preview on (default: let adb/simctl pick)
# id = "emulator-5554"

[android]
# Activity started after install
# component = "{component}"

[ios]
# Xcode scheme, also the name of the .xcodeproj
# scheme = "{scheme}"

# Bundle identifier launched on the simulator
# bundle_id = "{bundle_id}"

[build]
# Kill any single build/install command after this many seconds
# timeout_secs = 1800
"#,
            dev_port = DEFAULT_DEV_PORT,
            preview_port = DEFAULT_PREVIEW_PORT,
            component = DEFAULT_ANDROID_COMPONENT,
            scheme = DEFAULT_IOS_SCHEME,
            bundle_id = DEFAULT_IOS_BUNDLE_ID,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments (and the environment variables clap reads for them) always
/// take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<MobshellConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers a config file from `start_dir`.
    pub fn load(explicit: Option<&Path>, start_dir: &Path) -> Result<Self> {
        let found = match explicit {
            Some(path) => Some((MobshellConfig::load_from_file(path)?, path.to_path_buf())),
            None => MobshellConfig::discover_from(start_dir)?,
        };

        Ok(match found {
            Some((config, path)) => Self {
                config: Some(config),
                config_path: Some(path),
            },
            None => Self::default(),
        })
    }

    /// Project root: CLI, then the config file (relative to its directory),
    /// then `fallback`.
    pub fn root_dir(&self, cli_value: Option<PathBuf>, fallback: &Path) -> PathBuf {
        if let Some(root) = cli_value {
            return root;
        }

        let configured = self.config.as_ref().and_then(|c| c.project.root.clone());
        match (configured, self.config_dir()) {
            (Some(root), Some(dir)) if root.is_relative() => dir.join(root),
            (Some(root), _) => root,
            (None, Some(dir)) => dir.to_path_buf(),
            (None, None) => fallback.to_path_buf(),
        }
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Returns the Android configuration.
    pub fn android(&self) -> AndroidConfig {
        self.config
            .as_ref()
            .map(|c| c.android.clone())
            .unwrap_or_default()
    }

    /// Returns the iOS configuration.
    pub fn ios(&self) -> IosConfig {
        self.config
            .as_ref()
            .map(|c| c.ios.clone())
            .unwrap_or_default()
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&MobshellConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MobshellConfig::default();
        assert_eq!(config.android.component, DEFAULT_ANDROID_COMPONENT);
        assert_eq!(config.ios.scheme, "App");
        assert_eq!(config.ios.bundle_id, "com.example.golangmobile");
        assert!(config.dev.port.is_none());
        assert!(config.project.runtime.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
[project]
runtime = "expo"

[dev]
port = 3000

[device]
id = "emulator-5556"

[ios]
scheme = "Shell"

[build]
timeout_secs = 600
"#;
        std::fs::write(&config_path, toml_content).unwrap();

        let config = MobshellConfig::load_from_file(&config_path).unwrap();

        assert_eq!(config.project.runtime, Some(RuntimeSetting::Expo));
        assert_eq!(config.dev.port, Some(3000));
        assert_eq!(config.dev.preview_port, None);
        assert_eq!(config.device.id.as_deref(), Some("emulator-5556"));
        assert_eq!(config.ios.scheme, "Shell");
        assert_eq!(config.ios.bundle_id, DEFAULT_IOS_BUNDLE_ID);
        assert_eq!(config.build.timeout_secs, Some(600));
    }

    #[test]
    fn test_invalid_runtime_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[project]\nruntime = \"flutter\"\n").unwrap();

        let err = MobshellConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_discover_from_parent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[dev]\npreview_port = 9000\n").unwrap();
        let nested = temp_dir.path().join("frontend/src");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = MobshellConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.dev.preview_port, Some(9000));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_no_config() {
        let temp_dir = TempDir::new().unwrap();
        // Create a .git directory to stop the search
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        let result = MobshellConfig::discover_from(temp_dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_config_resolver_precedence() {
        let mut config = MobshellConfig::default();
        config.dev.port = Some(3000);
        let resolver = ConfigResolver {
            config: Some(config),
            config_path: None,
        };

        // CLI value takes precedence
        assert_eq!(resolver.resolve(Some(4000), |c| c.dev.port, DEFAULT_DEV_PORT), 4000);
        // Config value used when CLI is None
        assert_eq!(resolver.resolve(None, |c| c.dev.port, DEFAULT_DEV_PORT), 3000);
        // Default when neither is set
        assert_eq!(
            resolver.resolve(None, |c| c.dev.preview_port, DEFAULT_PREVIEW_PORT),
            DEFAULT_PREVIEW_PORT
        );
    }

    #[test]
    fn test_root_relative_to_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[project]\nroot = \"app\"\n").unwrap();

        let resolver = ConfigResolver::load(Some(&config_path), Path::new("/unused")).unwrap();
        assert_eq!(
            resolver.root_dir(None, Path::new(".")),
            temp_dir.path().join("app")
        );
        assert_eq!(
            resolver.root_dir(Some(PathBuf::from("/cli/root")), Path::new(".")),
            PathBuf::from("/cli/root")
        );
    }

    #[test]
    fn test_root_defaults_to_config_dir_then_fallback() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let resolver = ConfigResolver::load(None, temp_dir.path()).unwrap();
        assert_eq!(resolver.root_dir(None, Path::new(".")), temp_dir.path());

        let empty = ConfigResolver::default();
        assert_eq!(empty.root_dir(None, Path::new("/work")), PathBuf::from("/work"));
    }

    #[test]
    fn test_generate_starter_toml_parses_to_defaults() {
        let toml = MobshellConfig::generate_starter_toml();
        assert!(toml.contains("# port = 5173"));
        assert!(toml.contains("# preview_port = 8080"));
        assert!(toml.contains("com.example.golangmobile/.MainActivity"));

        let config: MobshellConfig = toml::from_str(&toml).unwrap();
        assert!(config.dev.port.is_none());
        assert_eq!(config.ios.scheme, DEFAULT_IOS_SCHEME);
    }
}
