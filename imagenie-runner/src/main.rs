use std::process::ExitCode;

use clap::Parser;

use imagenie_runner::app;
use imagenie_runner::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match app::execute(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "imagenie failed");
            eprintln!("imagenie: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
