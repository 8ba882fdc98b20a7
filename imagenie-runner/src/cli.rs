//! Command-line interface (clap derive). Declarative only, no I/O.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use imagenie_core::config::ImagenieConfig;

/// Config file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "imagenie.toml";

/// imagenie -- archive every clean container image of a registry namespace.
///
/// Discovers repositories, pulls and scans each image, converts those without
/// critical vulnerabilities and uploads the result. Containers that fail are
/// reported and skipped; the batch always continues.
#[derive(Parser, Debug)]
#[command(name = "imagenie", version, about, long_about = None)]
pub struct Cli {
    /// Path to the imagenie.toml configuration file [default: imagenie.toml].
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Registry namespace to archive (overrides registry.namespace).
    #[arg(long)]
    pub namespace: Option<String>,

    /// Upload destination, e.g. gs://bucket/base or file:///dir (overrides upload.destination).
    #[arg(long)]
    pub destination: Option<String>,

    /// Number of containers processed in parallel (overrides runner.concurrency).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: json or pretty.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Validate the effective configuration and exit.
    #[arg(long)]
    pub validate: bool,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl Cli {
    /// Config path to read.
    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }

    /// True when the user named a config file explicitly.
    pub fn config_is_explicit(&self) -> bool {
        self.config.is_some()
    }

    /// Applies flag overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut ImagenieConfig) {
        if let Some(namespace) = &self.namespace {
            config.registry.namespace.clone_from(namespace);
        }
        if let Some(destination) = &self.destination {
            config.upload.destination.clone_from(destination);
        }
        if let Some(concurrency) = self.concurrency {
            config.runner.concurrency = concurrency;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
