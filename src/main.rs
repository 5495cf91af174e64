use clap::Parser;

use httpception::config::Cli;
use httpception::lifecycle::signals::wait_for_signal;
use httpception::observability::{logging::init_logging, metrics::init_metrics};
use httpception::Application;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    init_logging(&config.observability)?;
    tracing::info!("httpception v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => {
                tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address");
            }
        }
    }

    let app = Application::bind(config).await?;

    let shutdown = app.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    app.run().await?;
    Ok(())
}
