use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, thread, time::Duration};

use clap::Parser;

use crate::{cost_model::RoadCostModel, error::ConfigError};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Multi-day bicycle touring route planner")]
pub struct ServerConfig {
    /// PostgreSQL URL of a pgRouting database (osm2pgrouting layout)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// JSON road network to route on in memory; takes precedence over the database
    #[arg(long, env = "GRAPH_JSON")]
    pub graph_json: Option<PathBuf>,

    /// JSON file with routing weights and speeds for every bike type
    #[arg(long, env = "COST_MODEL")]
    pub cost_model: Option<PathBuf>,

    /// Routing worker threads; defaults to the available parallelism
    #[arg(long, env = "ROUTING_WORKERS")]
    pub workers: Option<NonZeroUsize>,

    /// Per-call engine timeout in milliseconds
    #[arg(long, env = "ENGINE_TIMEOUT_MS")]
    pub engine_timeout_ms: Option<u64>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,
}

impl ServerConfig {
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .or_else(|| thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }

    /// Cost model from `--cost-model`, or the built-in tables.
    pub fn load_cost_model(&self) -> Result<RoadCostModel, ConfigError> {
        match &self.cost_model {
            Some(path) => {
                let model = RoadCostModel::from_file(path)?;
                tracing::info!("loaded cost model from {}", path.display());
                Ok(model)
            }
            None => Ok(RoadCostModel::default()),
        }
    }
}
