use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use schnorr_login::proto::auth_service_server::AuthServiceServer;
use schnorr_login::server::{AuthServiceImpl, ServerConfig};
use schnorr_login::store::ChallengeStore;
use schnorr_login::{
    GroupParams, MemoryChallengeStore, MemoryIdentityStore, ProtocolEngine, TokenIssuer,
    TokenValidator,
};
use tokio::{signal, time};
use tonic::transport::Server;
use tonic_health::server::{health_reporter, HealthReporter};
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Service = AuthServiceImpl<MemoryIdentityStore, MemoryChallengeStore>;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Schnorr zero-knowledge login server", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to (overrides configuration)
    #[arg(short = 'H', long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Seconds between expired-challenge sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        return Err(format!("Invalid configuration: {e}").into());
    }

    let group = Arc::new(GroupParams::modp_2048());
    let identities = MemoryIdentityStore::new();
    let challenges = MemoryChallengeStore::new();
    let engine = ProtocolEngine::new(
        Arc::clone(&group),
        identities,
        challenges.clone(),
        config.challenge.ttl_secs,
    );

    let signing_key = Arc::new(config.token.signing_key()?);
    let issuer = TokenIssuer::new(Arc::clone(&signing_key), config.token.lifetime_secs);
    let validator = TokenValidator::new(signing_key);

    let rate_limiter = config.rate_limit.build_limiter();
    let service = AuthServiceImpl::new(engine, issuer, validator, rate_limiter);

    spawn_challenge_sweeper(challenges, args.sweep_interval);

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr();
        tokio::spawn(async move {
            if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                error!("Failed to start metrics server: {e}");
            } else {
                info!("Metrics server started on {metrics_addr}");
            }
        });
    }

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter.set_serving::<AuthServiceServer<Service>>().await;

    let addr = config.addr();
    info!(
        group = group.name(),
        challenge_ttl_secs = config.challenge.ttl_secs,
        token_lifetime_secs = config.token.lifetime_secs,
        "Server starting on {addr}"
    );

    Server::builder()
        .add_service(health_service)
        .add_service(AuthServiceServer::new(service))
        .serve_with_shutdown(addr, shutdown_signal(health_reporter))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Evicts expired challenges in the background so abandoned logins do not
/// accumulate. Lookup-time expiry checks stay correct without it; this only
/// bounds memory.
fn spawn_challenge_sweeper(challenges: MemoryChallengeStore, interval_secs: u64) {
    tokio::spawn(async move {
        loop {
            let store = challenges.clone();
            let sweep_handle = tokio::spawn(async move {
                let mut interval = time::interval(Duration::from_secs(interval_secs));
                loop {
                    interval.tick().await;
                    let removed = store.sweep_expired().await;
                    if removed > 0 {
                        debug!(removed, "swept expired challenges");
                    }
                }
            });

            match sweep_handle.await {
                Ok(()) => error!("Sweeper task terminated unexpectedly, restarting..."),
                Err(e) => error!("Sweeper task panicked: {e:?}, restarting..."),
            }

            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });
}

async fn shutdown_signal(mut health_reporter: HealthReporter) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    health_reporter
        .set_not_serving::<AuthServiceServer<Service>>()
        .await;

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");
}
