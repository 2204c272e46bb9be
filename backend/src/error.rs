use std::{io, time::Duration};

use shared::{BikeType, FitnessLevel, Point, RoadSurfaceType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    /// The engine answered, but the admitted subgraph holds no path.
    #[error("no route found between {start} and {end}")]
    NoRouteFound { start: Point, end: Point },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("routing engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("routing engine call timed out after {0:?}")]
    EngineTimeout(Duration),
}

impl RouteError {
    pub fn no_route(start: &Point, end: &Point) -> Self {
        RouteError::NoRouteFound {
            start: start.clone(),
            end: end.clone(),
        }
    }
}

impl From<sqlx::Error> for RouteError {
    fn from(err: sqlx::Error) -> Self {
        RouteError::EngineUnavailable(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read cost model: {0}")]
    Io(#[from] io::Error),
    #[error("invalid cost model definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no profile configured for bike type {0:?}")]
    MissingBike(BikeType),
    #[error("{bike:?}: routing weight for {surface:?} must be finite and positive, got {value}")]
    InvalidWeight {
        bike: BikeType,
        surface: RoadSurfaceType,
        value: f64,
    },
    #[error("{bike:?}: speed multiplier for {surface:?} must be finite and positive, got {value}")]
    InvalidMultiplier {
        bike: BikeType,
        surface: RoadSurfaceType,
        value: f64,
    },
    #[error("{bike:?}: base speed for {fitness:?} must be finite and positive, got {value}")]
    InvalidSpeed {
        bike: BikeType,
        fitness: FitnessLevel,
        value: f64,
    },
    #[error("failed to start routing worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
