use std::sync::Arc;

use clap::Parser;
use tourplan::{
    AppState,
    config::ServerConfig,
    create_router,
    memory_network::InMemoryNetwork,
    network::RoadNetwork,
    pgrouting::PgRoutingNetwork,
    router::SegmentRouter,
    trip::TripBuilder,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SAMPLE_NETWORK_PATH: &str = "backend/data/sample_network.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourplan=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    let cost_model = Arc::new(config.load_cost_model()?);

    let network: Arc<dyn RoadNetwork> = match (&config.graph_json, &config.database_url) {
        (Some(path), _) => Arc::new(load_network_file(path)?),
        (None, Some(url)) => {
            Arc::new(PgRoutingNetwork::connect(url, config.max_connections, config.engine_timeout()).await?)
        }
        (None, None) => {
            tracing::warn!("no DATABASE_URL or GRAPH_JSON given, routing on {SAMPLE_NETWORK_PATH}");
            Arc::new(load_network_file(SAMPLE_NETWORK_PATH)?)
        }
    };

    let workers = config.worker_count();
    let trips = TripBuilder::with_workers(SegmentRouter::new(network), cost_model, workers)?;
    tracing::info!("routing pool started with {workers} worker(s)");

    let app = create_router(AppState {
        trips: Arc::new(trips),
    });

    tracing::info!("starting tourplan on http://{}", config.bind);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /api/trip - multi-day trip with day endpoints and time estimate");
    tracing::info!("  POST /api/day-endpoints - split computed routes into daily stages");
    tracing::info!("  POST /api/estimate-time - riding time for a distance on one surface");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_network_file(
    path: impl AsRef<std::path::Path>,
) -> Result<InMemoryNetwork, tourplan::memory_network::NetworkLoadError> {
    let path = path.as_ref();
    let network = InMemoryNetwork::from_file(path)?;
    tracing::info!("loaded road network from {}", path.display());
    Ok(network)
}
