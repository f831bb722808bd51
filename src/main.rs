use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use juicer_core::config::WatcherSettings;

mod config;
mod demo;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Load settings
    let mut settings = WatcherSettings::load(cli.config.as_ref())?;
    cli.merge_into(&mut settings);

    // Setup logging
    setup_logging(settings.debug);
    settings.validate();

    // Run the scripted demo
    let scenario = demo::load_scenario(cli.scenario.as_ref())?;
    let summary = demo::run(settings, scenario, cli.seed).await?;
    tracing::info!(
        "Demo finished: {} status changes, {} effects fired, {} failed",
        summary.status_changes,
        summary.fired,
        summary.failed
    );
    Ok(())
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("juicer=debug,juicer_core=debug")
    } else {
        EnvFilter::new("juicer=info,juicer_core=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
