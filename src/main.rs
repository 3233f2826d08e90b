//! Chango gateway server.
//!
//! Loads configuration from `CHANGO__*` environment variables, connects the
//! broker and (optionally) the message store, and serves `GET /ws` until
//! SIGINT or SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;

use chango_gateway::adapters::{
    Gateway, GatewayDeps, GatewaySettings, InMemoryMessageBroker, PostgresMessageStore,
    RedisMessageBroker,
};
use chango_gateway::config::{AppConfig, BrokerKind};
use chango_gateway::ports::{MessageBroker, MessageStore, SystemStamper};
use chango_gateway::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    telemetry::init(&config.server);
    tracing::info!("Chango gateway v{} starting", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let broker: Arc<dyn MessageBroker> = match config.gateway.broker {
        BrokerKind::Redis => Arc::new(RedisMessageBroker::connect(&config.redis).await?),
        BrokerKind::Memory => {
            tracing::warn!("Using in-memory broker; rooms are not shared across processes");
            Arc::new(InMemoryMessageBroker::new())
        }
    };

    let store: Option<Arc<dyn MessageStore>> = match &config.database {
        Some(database) => {
            Some(Arc::new(PostgresMessageStore::connect_lazy(database)?) as Arc<dyn MessageStore>)
        }
        None => {
            tracing::info!("No database configured; messages will not be persisted");
            None
        }
    };

    let gateway = Gateway::new(
        GatewayDeps {
            broker,
            store,
            stamper: Arc::new(SystemStamper),
        },
        GatewaySettings::from_config(&config),
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, gateway.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let report = gateway.shutdown(config.server.shutdown_grace()).await;
    tracing::info!(
        relays_cancelled = report.relays_cancelled,
        sessions_closed = report.sessions_closed,
        force_closed = report.force_closed,
        "Chango gateway stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
