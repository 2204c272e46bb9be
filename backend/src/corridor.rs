//! Geometric admission region around the straight line between two waypoints.
//!
//! The corridor bounds the subgraph the path-search engine has to explore. It
//! is the conjunction of two cheap tests over integer grid coordinates
//! (degrees × [`GRID_SCALE`], rounded):
//!
//! 1. the bounding box of both endpoints, expanded by the half-width;
//! 2. the distance to the line `a·x + b·y + c = 0` being below the half-width.
//!
//! With `x` = longitude and `y` = latitude, the line through `A` and `B` is
//! described by `a = y_b − y_a`, `b = x_a − x_b`, `c = x_b·y_a − x_a·y_b`, and
//! the distance of `(x, y)` to it is `|a·x + b·y + c| / sqrt(a² + b²)`.
//! Multiplying both sides by the norm and the grid scale turns the second test
//! into two linear inequalities the store can evaluate per row:
//!
//! ```text
//! (−w·norm − c)·S  <  a·grid_lon + b·grid_lat  <  (w·norm − c)·S
//! ```

use shared::Coordinate;

/// Integer grid resolution of the `grid_lon` / `grid_lat` columns.
pub const GRID_SCALE: f64 = 100.0;
/// Below this the grid is too coarse to admit any edge on short hops.
pub const MIN_HALF_WIDTH_DEG: f64 = 0.5;
pub const MAX_HALF_WIDTH_DEG: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub factor_a: f64,
    pub factor_b: f64,
    pub factor_c: f64,
    pub half_width_deg: f64,
    pub grid_scale: f64,
}

/// Expanded bounding box, already multiplied by the grid scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Corridor {
    pub fn between(start: Coordinate, end: Coordinate) -> Self {
        let (x_a, y_a) = (start.lon, start.lat);
        let (x_b, y_b) = (end.lon, end.lat);
        let distance_deg = ((x_a - x_b).powi(2) + (y_a - y_b).powi(2)).sqrt();

        Self {
            min_lon: x_a.min(x_b),
            max_lon: x_a.max(x_b),
            min_lat: y_a.min(y_b),
            max_lat: y_a.max(y_b),
            factor_a: y_b - y_a,
            factor_b: x_a - x_b,
            factor_c: x_b * y_a - x_a * y_b,
            half_width_deg: half_width_deg(distance_deg),
            grid_scale: GRID_SCALE,
        }
    }

    /// `sqrt(a² + b²)`; zero when both endpoints coincide.
    pub fn norm(&self) -> f64 {
        self.factor_a.hypot(self.factor_b)
    }

    /// Start and end at the same coordinate: only the box test applies.
    pub fn is_degenerate(&self) -> bool {
        self.norm() == 0.0
    }

    /// Perpendicular distance in degrees of `(lon, lat)` to the corridor axis.
    pub fn distance_to_line(&self, lon: f64, lat: f64) -> f64 {
        if self.is_degenerate() {
            return (lon - self.min_lon).hypot(lat - self.min_lat);
        }
        (self.factor_a * lon + self.factor_b * lat + self.factor_c).abs() / self.norm()
    }

    pub fn grid_bounds(&self) -> GridBounds {
        let w = self.half_width_deg;
        GridBounds {
            min_lon: (self.min_lon - w) * self.grid_scale,
            max_lon: (self.max_lon + w) * self.grid_scale,
            min_lat: (self.min_lat - w) * self.grid_scale,
            max_lat: (self.max_lat + w) * self.grid_scale,
        }
    }

    /// Exclusive bounds for `a·grid_lon + b·grid_lat`.
    pub fn line_bounds(&self) -> (f64, f64) {
        let reach = self.half_width_deg * self.norm();
        (
            (-reach - self.factor_c) * self.grid_scale,
            (reach - self.factor_c) * self.grid_scale,
        )
    }

    pub fn quantize(&self, degrees: f64) -> i64 {
        (degrees * self.grid_scale).round() as i64
    }

    /// Evaluates the admission predicate exactly as the store does.
    pub fn admits_grid(&self, grid_lon: i64, grid_lat: i64) -> bool {
        let (gx, gy) = (grid_lon as f64, grid_lat as f64);
        let bounds = self.grid_bounds();
        let in_box = (bounds.min_lon..=bounds.max_lon).contains(&gx)
            && (bounds.min_lat..=bounds.max_lat).contains(&gy);
        if !in_box {
            return false;
        }
        if self.is_degenerate() {
            return true;
        }
        let (lower, upper) = self.line_bounds();
        let value = self.factor_a * gx + self.factor_b * gy;
        lower < value && value < upper
    }

    pub fn admits(&self, coord: Coordinate) -> bool {
        self.admits_grid(self.quantize(coord.lon), self.quantize(coord.lat))
    }
}

/// Relative widening factor: about 3.1 for tiny hops, decaying towards 0.3.
pub fn relative_multiplier(distance_deg: f64) -> f64 {
    4.3 - 4.0 / (1.0 + (-3.5 * distance_deg + 1.0).exp())
}

/// Corridor half-width in degrees for a straight-line distance in degrees.
pub fn half_width_deg(distance_deg: f64) -> f64 {
    (distance_deg * relative_multiplier(distance_deg)).clamp(MIN_HALF_WIDTH_DEG, MAX_HALF_WIDTH_DEG)
}
