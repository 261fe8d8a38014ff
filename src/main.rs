//! mortality-ml entry point

use clap::Parser;
use mortality_ml::cli::{
    cmd_activate, cmd_benchmark, cmd_models, cmd_retire, cmd_serve, cmd_train, Cli, Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mortality_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, workers, data, store } => {
            cmd_serve(host, port, workers, &data, &store).await?;
        }
        Commands::Train { data, model, params, tune, experiment, store } => {
            cmd_train(&data, &model, params.as_deref(), tune, experiment, &store).await?;
        }
        Commands::Benchmark { data } => {
            cmd_benchmark(&data)?;
        }
        Commands::Models { model, active, store } => {
            cmd_models(model.as_deref(), active, &store).await?;
        }
        Commands::Activate { id, store } => {
            cmd_activate(id, &store).await?;
        }
        Commands::Retire { max_age_days, keep_best, max_deletions, store } => {
            cmd_retire(max_age_days, keep_best, max_deletions, &store).await?;
        }
    }

    Ok(())
}
