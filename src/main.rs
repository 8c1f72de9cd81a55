use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use superchatd::config::{Config, ConfigSeverity, LogFormat};
use superchatd::dispatch::context::Context;
use superchatd::http;
use superchatd::lifecycle::Lifecycle;
use superchatd::retention::RetentionTask;
use superchatd::session::SessionManager;
use superchatd::store::{SnapshotStore, Store};
use superchatd::telemetry;
use superchatd::transport::{ssh, tcp};

#[derive(Parser)]
struct Cli {
    #[arg(default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(std::path::Path::new(&cli.config)).unwrap_or_else(|e| {
        eprintln!("warning: {e}, using defaults");
        Config::default()
    });

    // ── Tracing ────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("superchatd=info,tower_http=info"));
    match config.log.format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let issues = config.validate();
    let fatal = issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error);
    for issue in &issues {
        tracing::warn!("{issue}");
    }
    if fatal {
        anyhow::bail!("invalid configuration, refusing to start");
    }

    tracing::info!(server_name = %config.server.name, "superchatd starting");
    let config = Arc::new(config);

    telemetry::register();

    // ── Persistence ────────────────────────────────────────────────
    let database_url = format!("sqlite://{}?mode=rwc", config.database.sqlite_path);
    let snapshot = Arc::new(
        SnapshotStore::connect(&database_url)
            .await
            .expect("failed to connect to snapshot database"),
    );
    let store = Arc::new(
        snapshot
            .load()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load snapshot, starting with empty store");
                Store::new()
            }),
    );

    // ── Sessions ───────────────────────────────────────────────────
    let sessions = Arc::new(SessionManager::new(
        config.limits.max_thread_subscriptions,
        config.limits.max_channel_subscriptions,
    ));

    let lifecycle = Lifecycle::new();
    let ctx = Context::with_lifecycle(store.clone(), sessions.clone(), config.clone(), lifecycle.clone());

    // ── Retention sweep ────────────────────────────────────────────
    let retention = RetentionTask::new(
        store.clone(),
        sessions.clone(),
        Duration::from_secs(config.session.retention_sweep_interval_seconds),
        config.session.idle_timeout_seconds,
        lifecycle.clone(),
    );
    tokio::spawn(retention.run());

    // ── Periodic snapshot flush ────────────────────────────────────
    {
        let snapshot = snapshot.clone();
        let store = store.clone();
        let interval = Duration::from_secs(config.database.snapshot_interval_seconds);
        let mut shutdown = lifecycle.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.recv() => {
                        tracing::info!("snapshot flush task shutting down");
                        if let Err(e) = snapshot.save(&store).await {
                            tracing::error!(error = %e, "failed to flush snapshot on shutdown");
                        }
                        break;
                    }
                }
                if let Err(e) = snapshot.save(&store).await {
                    tracing::error!(error = %e, "failed to flush snapshot");
                }
            }
        });
    }

    // ── Directory leaf-announcing ──────────────────────────────────
    if !config.directory.known_peers.is_empty() {
        let config = config.clone();
        let mut shutdown = lifecycle.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5 * 60));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.recv() => {
                        tracing::info!("directory announce task shutting down");
                        break;
                    }
                }
                superchatd::directory::announce_to_all_peers(&config).await;
            }
        });
    }

    {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received shutdown signal");
                lifecycle.shutdown();
            }
        });
    }

    // ── Transports ─────────────────────────────────────────────────
    if config.server.tcp_port != 0 {
        let ctx = ctx.clone();
        let bind = format!("{}:{}", config.server.bind_host, config.server.tcp_port);
        tokio::spawn(async move {
            if let Err(e) = tcp::listen(ctx, &bind).await {
                tracing::error!(error = %e, "TCP transport exited");
            }
        });
    }

    if config.server.ssh_port != 0 {
        let ctx = ctx.clone();
        let bind = format!("{}:{}", config.server.bind_host, config.server.ssh_port);
        tokio::spawn(async move {
            if let Err(e) = ssh::listen(ctx, &bind).await {
                tracing::error!(error = %e, "SSH transport exited");
            }
        });
    }

    if config.server.http_port != 0 {
        let app_state = http::AppState { ctx: ctx.clone() };
        let app = http::router(app_state)
            .into_make_service_with_connect_info::<SocketAddr>();
        let addr: SocketAddr = format!("{}:{}", config.server.bind_host, config.server.http_port)
            .parse()
            .expect("invalid HTTP bind address");
        tracing::info!(%addr, "HTTP transport listening");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
    } else {
        // No HTTP surface configured: park here so the spawned transports
        // keep running instead of the process exiting immediately.
        std::future::pending::<()>().await;
    }

    Ok(())
}
