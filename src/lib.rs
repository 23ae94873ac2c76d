pub mod auth;
pub mod config;
pub mod dates;
pub mod log;
pub mod providers;
pub mod rate_provider;
pub mod record;
pub mod server;
pub mod store;
pub mod sync;
pub mod upsert;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use config::AppConfig;
use providers::nbu::NbuProvider;
use server::AppState;
use store::sheets::{ServiceAccountKey, SheetsStore};
use store::RecordStore;
use sync::{SyncResponse, sync_range};

fn open_store(config: &AppConfig) -> Result<SheetsStore> {
    let key = ServiceAccountKey::from_file(&config.service_account_path)?;
    SheetsStore::new(
        &config.sheets_base_url,
        &config.spreadsheet_id,
        &config.worksheet,
        key,
    )
}

fn build_provider(config: &AppConfig) -> NbuProvider {
    NbuProvider::with_policy(
        &config.nbu_base_url,
        config.fetch_attempts,
        Duration::from_millis(config.fetch_backoff_ms),
    )
}

/// Run the HTTP trigger server until shutdown.
pub async fn run_server(config: AppConfig) -> Result<()> {
    info!("Rates sync server starting...");
    debug!("Loaded config: {config:#?}");

    let state = Arc::new(AppState {
        token: config.api_token.clone(),
        provider: Arc::new(build_provider(&config)),
        store: Arc::new(open_store(&config)?),
    });

    server::serve(state, &config.bind, config.port).await
}

/// One-shot sync over `[from, to]`, returning the same summary the HTTP
/// trigger would.
pub async fn run_sync_once(
    config: AppConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<SyncResponse> {
    server::validate_range(from, to).map_err(|e| anyhow::anyhow!("{e}"))?;

    let provider = build_provider(&config);
    let store = open_store(&config)?;
    let outcome = sync_range(&provider, &store, from, to, Utc::now()).await?;
    Ok(SyncResponse::from(outcome))
}

/// Verify store connectivity and (re)write the header row.
pub async fn run_setup(config: AppConfig) -> Result<()> {
    let store = open_store(&config)?;
    store.write_header().await?;
    info!("Sheet connected, header written");
    Ok(())
}
