//! Runs one harvesting pass.
//!
//! Configuration is read from the environment (and a `.env` file if present);
//! see [`tripo_harvester::Config`] for the variables.
//!
//! Usage:
//! `RUST_LOG=tripo_harvester=debug tripo-harvester`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripo_harvester::{Config, Harvester};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripo_harvester=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let harvester = Harvester::from_config(&config).await?;

    let summary = harvester.run().await?;
    for (date, outcome) in &summary.outcomes {
        tracing::info!(date = %date, outcome = %outcome, "result");
    }

    Ok(())
}
