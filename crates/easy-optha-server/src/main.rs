use anyhow::Context;
use clap::Parser;
use easy_optha_server::{cli::ServerArgs, log, start_server, state::State};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();

    let config = args.load().context("Configuration error")?;
    log::init(&config.log);

    info!(database = %config.database.path, "Opening history database");
    let state = State::new(config).context("Failed to open history database")?;

    start_server(state).await?;
    Ok(())
}
