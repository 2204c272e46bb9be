//! Splits a planned trip into daily stages of a target distance.

use std::iter;

use shared::{BikeType, Coordinate, FitnessLevel, Point, PointKind, Route};
use thiserror::Error;

use crate::{cost_model::RoadCostModel, geo_utils::geodesic_m};

/// Upper bound on emitted day boundaries, whatever the daily distance.
pub const MAX_DAYS: usize = 1_000;

#[derive(Debug, Error, PartialEq)]
enum GeometryError {
    #[error("daily distance must be finite and positive, got {0}")]
    InvalidDailyDistance(f64),
    #[error("route geometry has fewer than two vertices")]
    TooShort,
    #[error("vertex {0} has a non-finite coordinate")]
    NonFinite(usize),
    #[error("route length must be finite and positive, got {0}")]
    InvalidLength(f64),
    #[error("{days} days exceed the limit of {max}")]
    TooManyDays { days: f64, max: usize },
}

/// Where each day of riding ends, followed by the end of the trip.
///
/// Boundaries are placed every `daily_distance_m` of nominal route length.
/// A trip shorter than one day yields only its end point, and a trip whose
/// length is an exact multiple of the daily distance does not repeat the end
/// point. Malformed geometry is logged and degrades to the end point alone.
pub fn calculate_day_endpoints(routes: &[Route], daily_distance_m: f64) -> Vec<Point> {
    let Some(last) = routes.last() else {
        return Vec::new();
    };
    let end = last.end.clone();

    match day_boundaries(routes, daily_distance_m) {
        Ok(boundaries) => boundaries
            .into_iter()
            .enumerate()
            .map(|(idx, coord)| {
                Point::labelled(coord.lat, coord.lon, format!("End of day {}", idx + 1))
                    .with_kind(PointKind::Sleep)
            })
            .chain(iter::once(end))
            .collect(),
        Err(err) => {
            tracing::warn!("day endpoints fall back to the trip end: {err}");
            vec![end]
        }
    }
}

fn day_boundaries(routes: &[Route], daily_distance_m: f64) -> Result<Vec<Coordinate>, GeometryError> {
    if !daily_distance_m.is_finite() || daily_distance_m <= 0.0 {
        return Err(GeometryError::InvalidDailyDistance(daily_distance_m));
    }

    let nominal_m: f64 = routes.iter().map(|r| r.length_m).sum();
    if !nominal_m.is_finite() || nominal_m <= 0.0 {
        return Err(GeometryError::InvalidLength(nominal_m));
    }
    let days = (nominal_m / daily_distance_m).floor();
    if days > MAX_DAYS as f64 {
        return Err(GeometryError::TooManyDays { days, max: MAX_DAYS });
    }

    let path = merged_geometry(routes);
    if path.len() < 2 {
        return Err(GeometryError::TooShort);
    }
    if let Some(idx) = path.iter().position(|c| !c.is_finite()) {
        return Err(GeometryError::NonFinite(idx));
    }

    // cumulative[i] = geodesic distance from the start to vertex i
    let cumulative: Vec<f64> = iter::once(0.0)
        .chain(path.windows(2).scan(0.0, |acc, w| {
            *acc += geodesic_m(w[0], w[1]);
            Some(*acc)
        }))
        .collect();
    let geodesic_total = cumulative[cumulative.len() - 1];
    if geodesic_total <= 0.0 {
        return Err(GeometryError::InvalidLength(geodesic_total));
    }

    let scale = geodesic_total / nominal_m;
    let eps = nominal_m * 1e-9;
    let boundaries = (1..=days as usize)
        .map(|day| day as f64 * daily_distance_m)
        .take_while(|target| *target < nominal_m - eps)
        .map(|target| locate(&path, &cumulative, target * scale))
        .collect();
    Ok(boundaries)
}

fn merged_geometry(routes: &[Route]) -> Vec<Coordinate> {
    let mut path: Vec<Coordinate> = Vec::new();
    for route in routes {
        let mut coords = route.geometry.iter().copied().peekable();
        if path.last() == coords.peek() {
            coords.next();
        }
        path.extend(coords);
    }
    path
}

/// Point `distance_m` along `path`, interpolated between the bracketing vertices.
fn locate(path: &[Coordinate], cumulative: &[f64], distance_m: f64) -> Coordinate {
    let upper = cumulative
        .partition_point(|d| *d < distance_m)
        .clamp(1, path.len() - 1);
    let lower = upper - 1;
    let span = cumulative[upper] - cumulative[lower];
    if span <= 0.0 {
        return path[upper];
    }
    let t = ((distance_m - cumulative[lower]) / span).clamp(0.0, 1.0);
    path[lower].interpolate(path[upper], t)
}

/// Riding time for a whole route: every surface it covers at that surface's speed.
pub fn estimate_route_time_s(route: &Route, bike: BikeType, fitness: FitnessLevel, model: &RoadCostModel) -> u64 {
    route
        .length_by_surface
        .iter()
        .map(|(surface, length_m)| model.estimate_time_seconds(*length_m, bike, *surface, fitness))
        .sum()
}
