//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{DeviceType, Locale};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// SitePulse - guided web performance and SSL analysis
///
/// Runs a six-step analysis of a web site (DNS, SSL certificate,
/// security headers, performance metrics, Core Web Vitals, final report)
/// and writes a Markdown or JSON report.
///
/// Examples:
///   sitepulse analyze example.com
///   sitepulse analyze https://example.com --device mobile --language tr
///   sitepulse analyze example.com --format json --output report.json
///   sitepulse admin login
///   sitepulse admin stats
///   sitepulse init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .sitepulse.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the search log and visitor counters
    #[arg(long, value_name = "DIR", env = "SITEPULSE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a web site
    Analyze(AnalyzeArgs),

    /// Admin dashboard: search log and visitor counters
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Generate a default .sitepulse.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// URL to analyze; `https://` is added when no scheme is given
    #[arg(value_name = "URL")]
    pub url: String,

    /// Device the results are labelled for
    #[arg(short, long, value_name = "DEVICE")]
    pub device: Option<DeviceType>,

    /// Language of step titles and comments
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<Locale>,

    /// Output format (markdown, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting, with a .json extension for JSON output
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// SSL probe request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Base URL of the SSL Labs API
    #[arg(long, value_name = "URL", env = "SITEPULSE_SSL_API_URL")]
    pub ssl_api_url: Option<String>,

    /// Skip the fixed delays of the placeholder steps
    #[arg(long)]
    pub no_delay: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    /// Enable admin mode
    Login,

    /// Disable admin mode
    Logout,

    /// Show search and visitor statistics
    Stats {
        /// Clear the search log and visitor counters instead
        #[arg(long)]
        reset: bool,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Command::Analyze(ref analyze) = self.command {
            analyze.validate()?;
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_default` comes from the config file; `--quiet` still wins.
    pub fn log_level(&self, verbose_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl AnalyzeArgs {
    fn validate(&self) -> Result<(), String> {
        crate::url::normalize_url(&self.url).map_err(|e| e.to_string())?;

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref api_url) = self.ssl_api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("SSL API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        Ok(())
    }

    /// Report path: `--output`, else the configured default with the
    /// extension of the chosen format.
    pub fn output_path(&self, configured: &str) -> PathBuf {
        match self.output {
            Some(ref path) => path.clone(),
            None => Path::new(configured).with_extension(self.format.extension()),
        }
    }
}
