//! Relying service
//!
//! Verifies storefront identity tokens and serves the caller's identity
//! record. Also the reference wiring for any service that embeds the
//! identity middleware.

use common::types::IdentityId;
use identity_service::auth::{Claims, EcdsaSigner, TokenSigner, TokenValidator, ValidationOptions};
use identity_service::cache::IdentityCache;
use identity_service::config::Config;
use identity_service::keys::{load_key_pair, load_public_key};
use identity_service::lookup::IdentityLookup;
use identity_service::middleware::AuthState;
use identity_service::observability::metrics::init_metrics_recorder;
use identity_service::resolver::HttpIdentityResolver;
use identity_service::routes::{self, AppState, DEFAULT_REQUEST_TIMEOUT};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,relying_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting relying service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        identity_service_url = %config.identity_service_url,
        clock_skew_secs = config.clock_skew.as_secs(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let public_key = load_public_key(Path::new(&config.public_key_path)).map_err(|e| {
        error!("Failed to load public key: {}", e);
        e
    })?;

    let validator = Arc::new(TokenValidator::new(
        &public_key,
        ValidationOptions {
            issuer: config.expected_issuer.clone(),
            audience: config.expected_audience.clone(),
            leeway: config.clock_skew,
        },
    ));

    if let Some(private_key_path) = &config.private_key_path {
        check_signing_key(&config, Path::new(private_key_path), &validator)?;
    }

    let resolver = HttpIdentityResolver::new(
        config.identity_service_url.clone(),
        config.resolver_timeout,
    )
    .map_err(|e| {
        error!("Failed to build identity resolver: {}", e);
        e
    })?;

    let cache = Arc::new(IdentityCache::with_sweep_interval(
        config.cache_ttl,
        config.cache_sweep_interval,
    ));
    let lookup = IdentityLookup::new(Arc::clone(&cache), Arc::new(resolver));

    let state = AppState {
        auth: Arc::new(AuthState { validator, lookup }),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Relying service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache.shutdown().await;

    info!("Relying service shutdown complete");

    Ok(())
}

/// Fail startup unless the configured private key pairs with the public key
/// and produces tokens this service accepts.
fn check_signing_key(
    config: &Config,
    private_key_path: &Path,
    validator: &TokenValidator,
) -> Result<(), Box<dyn std::error::Error>> {
    let private_key = load_key_pair(private_key_path, Path::new(&config.public_key_path))
        .map_err(|e| {
            error!("Failed to load signing key: {}", e);
            e
        })?;
    let signer = EcdsaSigner::new(&private_key);

    let probe_subject = IdentityId::new(1).ok_or("invalid probe subject")?;
    let audience: Vec<&str> = [config.expected_audience.as_str()]
        .into_iter()
        .filter(|a| !a.is_empty())
        .collect();
    let probe = Claims::new(
        probe_subject,
        &config.expected_issuer,
        &audience,
        Duration::from_secs(60),
    );

    let token = signer.sign(&probe)?;
    validator.verify(&token)?;

    info!("Signing key verified against validator");
    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
