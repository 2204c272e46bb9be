use std::{collections::BTreeMap, sync::Arc};

use shared::{Coordinate, Point, RoadSurfaceType, Route};

use crate::{
    corridor::Corridor,
    cost_model::CostWeights,
    error::RouteError,
    network::{EdgeCost, GraphNode, PathEdge, PathQuery, RoadNetwork},
};

/// Routes one ordered waypoint pair through the road network.
#[derive(Clone)]
pub struct SegmentRouter {
    network: Arc<dyn RoadNetwork>,
}

impl SegmentRouter {
    pub fn new(network: Arc<dyn RoadNetwork>) -> Self {
        Self { network }
    }

    /// Find the cheapest path from `start` to `end` under `weights`.
    ///
    /// The search is limited to the corridor around the straight line between
    /// the two waypoints. When nothing inside it connects the endpoints the
    /// call fails with [`RouteError::NoRouteFound`]; the corridor is never
    /// widened here.
    pub fn find_path(&self, start: &Point, end: &Point, weights: &CostWeights) -> Result<Route, RouteError> {
        let start_node = self.resolve(start, start, end)?;
        let end_node = self.resolve(end, start, end)?;

        let corridor = Corridor::between(start.coordinate(), end.coordinate());
        tracing::debug!(
            "segment {} -> {}: nodes {} -> {}, corridor half-width {:.3}°",
            start,
            end,
            start_node.id,
            end_node.id,
            corridor.half_width_deg
        );

        let query = PathQuery {
            start_node: start_node.id,
            end_node: end_node.id,
            directed: true,
            cost: EdgeCost::new(*weights),
            corridor,
        };
        let edges = self.network.shortest_path(&query)?;
        assemble_route(start, end, edges)
    }

    fn resolve(&self, point: &Point, start: &Point, end: &Point) -> Result<GraphNode, RouteError> {
        self.network.nearest_node(point.coordinate())?.ok_or_else(|| {
            tracing::debug!("no graph node near {point}");
            RouteError::no_route(start, end)
        })
    }
}

/// Merge ordered path edges into one route with aggregate lengths.
pub fn assemble_route(start: &Point, end: &Point, edges: Vec<PathEdge>) -> Result<Route, RouteError> {
    if edges.is_empty() {
        return Err(RouteError::no_route(start, end));
    }

    let mut length_by_surface: BTreeMap<RoadSurfaceType, f64> =
        RoadSurfaceType::ALL.into_iter().map(|surface| (surface, 0.0)).collect();
    let mut geometry: Vec<Coordinate> = Vec::with_capacity(edges.iter().map(|e| e.geometry.len()).sum());
    let mut length_m = 0.0;

    for edge in edges {
        length_m += edge.length_m;
        *length_by_surface.entry(edge.surface).or_insert(0.0) += edge.length_m;

        let mut coords = edge.geometry.into_iter().peekable();
        if geometry.last() == coords.peek() {
            coords.next();
        }
        geometry.extend(coords);
    }

    if geometry.len() < 2 || !length_m.is_finite() {
        return Err(RouteError::no_route(start, end));
    }

    Ok(Route {
        start: start.clone(),
        end: end.clone(),
        geometry,
        length_m,
        length_by_surface,
    })
}
