use std::time::Duration;

use chrono::Utc;
use tracing::info;

use charla_server::config::ServerConfig;
use charla_server::logging::init_tracing;
use charla_server::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Load configuration and initialize tracing (respects RUST_LOG)
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    init_tracing(config.log_json);

    info!("Starting Charla server v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Loaded configuration");
    info!(
        admin_enabled = config.admin_enabled(),
        twilio_configured = config.twilio_configured(),
        sms_dry_run = config.sms_dry_run,
        utc_offset_minutes = config.utc_offset_minutes,
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 2. Open the database and file store
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState::open(config).await?;

    // -----------------------------------------------------------------------
    // 3. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = app_state.rate_limiter.clone();
    let vl = app_state.verifier.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(Duration::from_secs(600)).await;
            vl.purge_stale(Duration::from_secs(3600)).await;
        }
    });

    // Expired verification codes and admin tokens (every minute)
    let verifier = app_state.verifier.clone();
    let sessions = app_state.admin_sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now = Utc::now();
            verifier.pending().purge_expired(now).await;
            sessions.purge_expired(now).await;
        }
    });

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
