//! Multi-day trip assembly.
//!
//! A trip is split into day-segments at overnight stops, and every waypoint
//! pair is routed as its own task. Days and pairs fan out on the same bounded
//! rayon pool; results are gathered by position, so the route list always
//! follows the waypoint order no matter which search finishes first.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use shared::{BikeType, Point, Route};

use crate::{
    cost_model::{CostWeights, RoadCostModel},
    error::{ConfigError, RouteError},
    router::SegmentRouter,
};

/// Split waypoints into day-segments.
///
/// A sleep point ends the current segment and starts the next one, so it
/// appears in both. Segments that would hold a single point (nothing ridden
/// that day) are not emitted.
pub fn split_route_by_sleeping_points(points: &[Point]) -> Vec<Vec<Point>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for point in points {
        current.push(point.clone());
        if point.is_sleep() {
            if current.len() > 1 {
                segments.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            current.push(point.clone());
        }
    }

    if current.len() > 1 {
        segments.push(current);
    }
    segments
}

#[derive(Clone)]
pub struct TripBuilder {
    router: SegmentRouter,
    cost_model: Arc<RoadCostModel>,
    pool: Arc<ThreadPool>,
}

impl TripBuilder {
    pub fn new(router: SegmentRouter, cost_model: Arc<RoadCostModel>, pool: Arc<ThreadPool>) -> Self {
        Self {
            router,
            cost_model,
            pool,
        }
    }

    /// Builder with its own pool of `workers` routing threads.
    pub fn with_workers(
        router: SegmentRouter,
        cost_model: Arc<RoadCostModel>,
        workers: usize,
    ) -> Result<Self, ConfigError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("routing-worker-{idx}"))
            .build()?;
        Ok(Self::new(router, cost_model, Arc::new(pool)))
    }

    pub fn cost_model(&self) -> &RoadCostModel {
        &self.cost_model
    }

    /// Route every consecutive waypoint pair, in waypoint order.
    pub fn build_trip(&self, waypoints: &[Point], bike: BikeType) -> Result<Vec<Route>, RouteError> {
        let days = self.build_trip_days(waypoints, bike)?;
        Ok(days.into_iter().flatten().collect())
    }

    /// Like [`build_trip`](Self::build_trip), grouped by day-segment.
    ///
    /// Any failing pair fails the whole trip. Sibling searches already running
    /// are still awaited; the error reported is the first one in waypoint order.
    pub fn build_trip_days(&self, waypoints: &[Point], bike: BikeType) -> Result<Vec<Vec<Route>>, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::InvalidInput(format!(
                "a trip needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if let Some(bad) = waypoints.iter().find(|p| !p.coordinate().is_finite()) {
            return Err(RouteError::InvalidInput(format!("waypoint {bad} has a non-finite coordinate")));
        }

        let days = split_route_by_sleeping_points(waypoints);
        let weights = *self.cost_model.weights_for(bike);
        tracing::info!(
            "building {:?} trip: {} waypoints over {} day(s)",
            bike,
            waypoints.len(),
            days.len()
        );

        let results: Vec<Result<Vec<Route>, RouteError>> = self
            .pool
            .install(|| days.par_iter().map(|day| self.route_day(day, &weights)).collect());
        let routes = first_error_in_order(results)?;

        debug_assert!(routes.iter().all(|day| day.windows(2).all(|w| w[0].end == w[1].start)));
        Ok(routes)
    }

    fn route_day(&self, day: &[Point], weights: &CostWeights) -> Result<Vec<Route>, RouteError> {
        let results: Vec<Result<Route, RouteError>> = day
            .par_windows(2)
            .map(|pair| self.router.find_path(&pair[0], &pair[1], weights))
            .collect();
        first_error_in_order(results)
    }
}

/// All tasks have completed by the time this runs; keep the positional order.
fn first_error_in_order<T>(results: Vec<Result<T, RouteError>>) -> Result<Vec<T>, RouteError> {
    let failures = results.iter().filter(|r| r.is_err()).count();
    if failures > 0 {
        tracing::warn!("{failures} of {} segment task(s) failed", results.len());
    }
    results.into_iter().collect()
}
