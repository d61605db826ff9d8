//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.sitepulse.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{DeviceType, Locale};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".sitepulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Step timing settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// SSL probe settings.
    #[serde(default)]
    pub ssl: SslConfig,

    /// Local store settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Device the results are labelled for.
    #[serde(default)]
    pub device: DeviceType,

    /// Language of step titles and comments.
    #[serde(default)]
    pub locale: Locale,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            device: DeviceType::default(),
            locale: Locale::default(),
        }
    }
}

fn default_output() -> String {
    "sitepulse_report.md".to_string()
}

/// Delays used by placeholder steps, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_dns_delay")]
    pub dns_delay_ms: u64,

    #[serde(default = "default_headers_delay")]
    pub headers_delay_ms: u64,

    #[serde(default = "default_report_delay")]
    pub report_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dns_delay_ms: default_dns_delay(),
            headers_delay_ms: default_headers_delay(),
            report_delay_ms: default_report_delay(),
        }
    }
}

impl AnalysisConfig {
    pub fn dns_delay(&self) -> Duration {
        Duration::from_millis(self.dns_delay_ms)
    }

    pub fn headers_delay(&self) -> Duration {
        Duration::from_millis(self.headers_delay_ms)
    }

    pub fn report_delay(&self) -> Duration {
        Duration::from_millis(self.report_delay_ms)
    }
}

fn default_dns_delay() -> u64 {
    1500
}

fn default_headers_delay() -> u64 {
    1500
}

fn default_report_delay() -> u64 {
    1000
}

/// SSL probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslConfig {
    /// Base URL of the SSL Labs API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds. No retries are made.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.ssllabs.com/api/v3".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted counters.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// How long an update waits for another process holding the store lock.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

fn default_lock_timeout() -> u64 {
    5000
}

impl StorageConfig {
    /// Resolve the data directory.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sitepulse")
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with the `analyze` arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::AnalyzeArgs) {
        if let Some(device) = args.device {
            self.general.device = device;
        }
        if let Some(locale) = args.language {
            self.general.locale = locale;
        }
        if let Some(timeout) = args.timeout {
            self.ssl.timeout_seconds = timeout;
        }
        if let Some(ref api_url) = args.ssl_api_url {
            self.ssl.api_url = api_url.clone();
        }
        if args.no_delay {
            self.analysis.dns_delay_ms = 0;
            self.analysis.headers_delay_ms = 0;
            self.analysis.report_delay_ms = 0;
        }
    }

    /// Apply global flags shared by every command.
    pub fn merge_with_globals(&mut self, args: &crate::cli::Args) {
        if args.verbose {
            self.general.verbose = true;
        }
        if let Some(ref dir) = args.data_dir {
            self.storage.data_dir = Some(dir.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
