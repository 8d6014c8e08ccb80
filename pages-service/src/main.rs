use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use common_auth::JwtVerifier;
use pages_service::metrics::ServiceMetrics;
use pages_service::store::MemoryStore;
use pages_service::uploads::HttpPresigner;
use pages_service::{build_router, AppState, ServiceConfig, UploadSettings};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServiceConfig::from_env()?;

    let verifier = Arc::new(JwtVerifier::new(config.jwt.clone()));
    match verifier.key_cache().get_keys().await {
        Ok(keys) => info!(
            keys = keys.len(),
            kids = ?keys.kids().collect::<Vec<_>>(),
            "signing keys loaded"
        ),
        Err(err) => warn!(%err, "could not prefetch signing keys; will retry on first request"),
    }

    let metrics = Arc::new(ServiceMetrics::new()?);
    let store = Arc::new(MemoryStore::new());
    let mut state = AppState::new(
        verifier,
        store,
        &config.pages_table,
        &config.analytics_table,
        metrics,
    );
    match (&config.upload_bucket, &config.upload_presign_endpoint) {
        (Some(bucket), Some(endpoint)) => {
            state = state.with_uploads(UploadSettings {
                issuer: Arc::new(HttpPresigner::new(endpoint.clone())),
                bucket: bucket.clone(),
                ttl: config.upload_url_ttl,
            });
            info!(%bucket, "page uploads enabled");
        }
        (Some(bucket), None) => {
            warn!(%bucket, "UPLOAD_BUCKET set without UPLOAD_PRESIGN_ENDPOINT; uploads disabled")
        }
        _ => {}
    }

    let app = build_router(state, &config.cors_allowed_origins);

    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("HOST '{}' is not an IP address", config.host))?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting pages-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
