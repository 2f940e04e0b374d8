use clap::Parser;
use keeper::{setup_logging, Cli};
use log::{error, info};
use shared::utils::signal::cancel_on_shutdown_signal;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let cancellation_token = CancellationToken::new();
    let signal_handle = match cancel_on_shutdown_signal(cancellation_token.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to install signal handlers: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = cli.run(cancellation_token.clone()) => result,
        _ = cancellation_token.cancelled() => {
            info!("Received cancellation request");
            Ok(())
        }
    };

    cancellation_token.cancel();
    signal_handle.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command execution error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
