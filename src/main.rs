//! Projectionist - batch playback validation for Jellyfin movie libraries

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use projectionist::app;
use projectionist::archive::DefectArchive;
use projectionist::checkpoint::CheckpointStore;
use projectionist::config::Config;
use projectionist::services::JellyfinClient;
use projectionist::validator::MovieValidator;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "projectionist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };

    tracing::info!(server = %config.base_url, "Starting projectionist");

    let client = match JellyfinClient::new(
        &config.base_url,
        &config.api_key,
        &config.user_id,
        config.request_timeout,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to build Jellyfin client: {e:#}");
            return ExitCode::from(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current movie");
            signal_cancel.cancel();
        }
    });

    let mut store = CheckpointStore::load(&config.checkpoint_path);
    let validator = MovieValidator::new(
        client.clone(),
        DefectArchive::new(&config.defect_log_path),
        config.defect_tag.clone(),
        config.pause_between,
        cancel.clone(),
    );

    match app::run(&config, client, &mut store, &validator, &cancel).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            tracing::error!("Fatal: {e:#}");
            ExitCode::from(1)
        }
    }
}
