//! Explorer configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/ev3explorer/explorer.toml`
//! - Windows: `%APPDATA%/ev3explorer/explorer.toml`

use std::path::{Path, PathBuf};

use ev3explorer_protocol::constants::{DEFAULT_ROOT_PREFIX, DEFAULT_START_DIRECTORY};
use ev3explorer_transfer::TransferOptions;
use serde::{Deserialize, Serialize};

/// External compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Executable to run.
    pub program: String,

    /// Arguments placed before the source kind.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Explorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial or RFCOMM device node the brick is reachable through.
    #[serde(default = "default_device")]
    pub device: String,

    /// `host:port` of a TCP bridge; used instead of `device` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Prefix put in front of every brick path.
    #[serde(default = "default_root_prefix")]
    pub root_prefix: String,

    /// Directory the explorer starts in.
    #[serde(default = "default_start_directory")]
    pub start_directory: String,

    /// Bytes per transfer round-trip.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Connect, read and write timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Compiler used by `deploy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerConfig>,
}

fn default_device() -> String {
    "/dev/rfcomm0".into()
}

fn default_root_prefix() -> String {
    DEFAULT_ROOT_PREFIX.into()
}

fn default_start_directory() -> String {
    DEFAULT_START_DIRECTORY.into()
}

fn default_chunk_size() -> usize {
    TransferOptions::default().chunk_size()
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            address: None,
            root_prefix: default_root_prefix(),
            start_directory: default_start_directory(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
            compiler: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform default location
    /// when `None`. A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Transfer options with the chunk size clamped to what the brick allows.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::with_chunk_size(self.chunk_size)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata)
            .join("ev3explorer")
            .join("explorer.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        Ok(base.join("ev3explorer").join("explorer.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.device, "/dev/rfcomm0");
        assert!(config.address.is_none());
        assert_eq!(config.root_prefix, "/.");
        assert_eq!(config.start_directory, "/home/root/lms2012/prjs/");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.timeout_secs, 5);
        assert!(config.compiler.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            address: Some("10.0.0.7:5555".into()),
            chunk_size: 200,
            compiler: Some(CompilerConfig {
                program: "ev3compile".into(),
                args: vec!["--quiet".into()],
            }),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.address.as_deref(), Some("10.0.0.7:5555"));
        assert_eq!(parsed.chunk_size, 200);
        assert_eq!(parsed.compiler, config.compiler);
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"device = "/dev/ttyACM0""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.start_directory, "/home/root/lms2012/prjs/");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn oversized_chunk_is_clamped() {
        let config = Config {
            chunk_size: 1_000_000,
            ..Config::default()
        };
        assert_eq!(config.transfer_options().chunk_size(), 1000);
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("ev3explorer"));
    }

    #[test]
    fn load_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("explorer.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.device, "/dev/rfcomm0");
        assert!(path.exists());

        std::fs::write(&path, "timeout_secs = 9\n").unwrap();
        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.timeout_secs, 9);
    }
}
