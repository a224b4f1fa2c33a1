mod auth;
mod db_core;
mod error;
mod knowledge;
mod model;
mod prompt;
mod rate_limiters;
mod request_tracing;
mod routes;
mod server_config;
#[cfg(test)]
mod testing;

use std::{env, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use mimalloc::MiMalloc;
use prompt::{provider_factory, LlmFactory};
use rate_limiters::RateLimiters;
use routes::ServerRouter;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use server_config::cfg;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    conn: DatabaseConnection,
    rate_limiters: RateLimiters,
    llm_factory: LlmFactory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let db_url = env::var("DATABASE_URL").context("DATABASE_URL is not set in .env file")?;
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .context("Database connection failed")?;

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(cfg.api.request_timeout_secs))
        .build()?;

    let rate_limiters = RateLimiters::from_env();
    let state = ServerState {
        conn,
        llm_factory: provider_factory(http_client, rate_limiters.clone()),
        rate_limiters,
    };

    let router = ServerRouter::create(state)?;

    let port = env::var("PORT").unwrap_or("5006".to_string());
    let port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid PORT {:?}", port))?;
    // check config
    tracing::info!("{}", *cfg);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Aomail server running on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
