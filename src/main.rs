use std::net::SocketAddr;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::time::{self, Duration as TokioDuration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brightline::{config, db, routes, state::AppState};

/// How often stale rate-limit entries are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: TokioDuration = TokioDuration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging: stdout plus a daily rotated file under ./logs
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "brightline.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Writers flush only while their guards are alive
    let _log_guards = (stdout_guard, file_guard);

    // Load configuration (embedded defaults -> brightline.toml -> env/.env); refuses to start
    // without a session secret.
    let app_cfg = config::load()?;
    info!(
        canonical_domain = %app_cfg.site.canonical_domain,
        admin_prefix = %app_cfg.auth.admin_prefix,
        "Configuration loaded"
    );

    let db_url = &app_cfg.database.url;
    config::ensure_sqlite_parent_dir(db_url)?;
    let connect_opts = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(connect_opts).await?;
    db::init_db(&pool).await?;

    let state = AppState::new(pool, app_cfg.clone())?;

    // Periodic cleanup so idle rate-limit keys do not accumulate
    {
        let rl = state.rate_limiter.clone();
        let max_window = app_cfg.rate_limits.max_window_ms();
        tokio::spawn(async move {
            let mut ticker = time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                rl.cleanup(max_window).await;
            }
        });
    }

    let app = routes::router(state);

    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Brightline listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
