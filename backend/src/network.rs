use shared::{Coordinate, RoadSurfaceType};

use crate::{corridor::Corridor, cost_model::CostWeights, error::RouteError};

/// Road network backend answering the two queries the segment router needs.
///
/// Implementations are shared between worker threads and must be safe to
/// call concurrently; every call is a read-only query.
///
/// # Contract
/// - `nearest_node` returns `Ok(None)` when no node can serve the coordinate.
/// - `shortest_path` returns `Ok(vec![])` when the admitted subgraph holds no
///   path; backend failures are `Err(EngineUnavailable | EngineTimeout)`.
/// - Returned edges are ordered from start node to end node, each geometry
///   oriented in travel direction.
pub trait RoadNetwork: Send + Sync {
    fn nearest_node(&self, coord: Coordinate) -> Result<Option<GraphNode>, RouteError>;

    fn shortest_path(&self, query: &PathQuery) -> Result<Vec<PathEdge>, RouteError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphNode {
    pub id: i64,
    pub coord: Coordinate,
}

/// Per-edge cost expression: `weight(surface) × length`.
///
/// Reverse traversal costs the same unless the stored reverse cost is
/// negative, which marks the edge as one-way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCost {
    pub weights: CostWeights,
}

impl EdgeCost {
    pub fn new(weights: CostWeights) -> Self {
        Self { weights }
    }

    pub fn forward(&self, surface: RoadSurfaceType, length: f64) -> f64 {
        self.weights.weight(surface) * length
    }

    /// Signed reverse cost; negative values mean "not traversable".
    pub fn reverse(&self, surface: RoadSurfaceType, length: f64, stored_reverse_cost: f64) -> f64 {
        reverse_direction_sign(stored_reverse_cost) * self.forward(surface, length)
    }
}

pub fn reverse_direction_sign(stored_reverse_cost: f64) -> f64 {
    if stored_reverse_cost < 0.0 { -1.0 } else { 1.0 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    pub start_node: i64,
    pub end_node: i64,
    pub directed: bool,
    pub cost: EdgeCost,
    pub corridor: Corridor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathEdge {
    pub geometry: Vec<Coordinate>,
    pub surface: RoadSurfaceType,
    pub length_m: f64,
}
