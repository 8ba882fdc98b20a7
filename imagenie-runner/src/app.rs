//! Command execution: config loading, wiring and report output.

use std::path::PathBuf;

use imagenie_core::ImagenieConfig;
use imagenie_core::error::{ConfigError, ImagenieError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;
use crate::error::RunError;
use crate::orchestrator::ProductionOrchestrator;
use crate::output::OutputWriter;
use crate::report::ConfigCheck;
use crate::{logging, metrics_server, signal};

/// Loads the effective configuration: file, then environment, then flags.
///
/// A missing file is an error only when `--config` was given explicitly;
/// otherwise built-in defaults are used. Returns the config and the path it
/// was read from.
pub async fn load_config(cli: &Cli) -> Result<(ImagenieConfig, Option<PathBuf>), RunError> {
    let path = cli.config_path();
    let (mut config, source) = match ImagenieConfig::from_file(path).await {
        Ok(config) => (config, Some(path.to_owned())),
        Err(ImagenieError::Config(ConfigError::FileNotFound { .. }))
            if !cli.config_is_explicit() =>
        {
            (ImagenieConfig::default(), None)
        }
        Err(e) => return Err(e.into()),
    };

    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok((config, source))
}

/// Runs the command line to completion and returns the process exit code.
pub async fn execute(cli: Cli) -> Result<u8, RunError> {
    let (config, source) = load_config(&cli).await?;
    let writer = OutputWriter::new(cli.output);

    if cli.validate {
        writer.render(&ConfigCheck {
            config_path: source.map(|p| p.display().to_string()),
            valid: true,
            effective: &config,
        })?;
        return Ok(0);
    }

    logging::init_tracing(&config.general)?;
    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }
    let config_source = source
        .as_ref()
        .map_or_else(|| "built-in defaults".to_owned(), |p| p.display().to_string());
    info!(config = config_source.as_str(), "imagenie starting");

    let orchestrator = ProductionOrchestrator::from_config(config)?;
    let token = CancellationToken::new();
    let listener = signal::cancel_on_signal(token.clone());

    let result = orchestrator.run(token).await;
    listener.abort();

    let report = result?;
    writer.render(&report)?;
    Ok(report.exit_code())
}
