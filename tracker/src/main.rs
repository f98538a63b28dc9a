use std::{net::SocketAddr, sync::Arc};

use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker::{
    AppState, create_router,
    config::EngineConfig,
    error::TrackerError,
    osrm::{OfflineRouter, OsrmClient, RoadRouter},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracker=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env().map_err(TrackerError::from)?;
    let router: Arc<dyn RoadRouter> = if config.routing.enabled {
        tracing::info!("road routing through {}", config.routing.base_url);
        Arc::new(
            OsrmClient::new(config.routing.base_url.clone(), config.routing.timeout())
                .map_err(TrackerError::from)?,
        )
    } else {
        tracing::info!("road routing disabled, using simulated routes only");
        Arc::new(OfflineRouter)
    };

    let addr: SocketAddr = config.bind.parse()?;
    let state = AppState {
        config: Arc::new(config),
        router,
    };
    let app = create_router(state).layer(CorsLayer::permissive());

    tracing::info!("starting tracker on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
