use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Role of a waypoint inside a trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    #[default]
    Regular,
    /// Overnight stop: closes one day-segment and opens the next.
    Sleep,
    Poi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub kind: PointKind,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            label: default_label(),
            kind: PointKind::Regular,
        }
    }

    pub fn labelled(lat: f64, lon: f64, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::new(lat, lon)
        }
    }

    pub fn with_kind(mut self, kind: PointKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_sleep(&self) -> bool {
        self.kind == PointKind::Sleep
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.5}, {:.5})", self.label, self.lat, self.lon)
    }
}

impl From<Coordinate> for Point {
    fn from(coord: Coordinate) -> Self {
        Point::new(coord.lat, coord.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadSurfaceType {
    Primary,
    Secondary,
    Paved,
    Unpaved,
    UnknownSurface,
    Cycleway,
}

impl RoadSurfaceType {
    pub const ALL: [RoadSurfaceType; 6] = [
        RoadSurfaceType::Primary,
        RoadSurfaceType::Secondary,
        RoadSurfaceType::Paved,
        RoadSurfaceType::Unpaved,
        RoadSurfaceType::UnknownSurface,
        RoadSurfaceType::Cycleway,
    ];

    /// Value of the `road_type` column in the routing store.
    pub fn store_tag(self) -> &'static str {
        match self {
            RoadSurfaceType::Primary => "roads_primary",
            RoadSurfaceType::Secondary => "roads_secondary",
            RoadSurfaceType::Paved => "roads_paved",
            RoadSurfaceType::Unpaved => "roads_unpaved",
            RoadSurfaceType::UnknownSurface => "roads_unknown_surface",
            RoadSurfaceType::Cycleway => "cycleways",
        }
    }

    pub fn from_store_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|surface| surface.store_tag() == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeType {
    Road,
    Gravel,
    Trekking,
    #[serde(alias = "mtb")]
    Mountain,
    #[serde(rename = "ebike", alias = "e-bike")]
    EBike,
}

impl BikeType {
    pub const ALL: [BikeType; 5] = [
        BikeType::Road,
        BikeType::Gravel,
        BikeType::Trekking,
        BikeType::Mountain,
        BikeType::EBike,
    ];
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Low,
    #[default]
    Medium,
    Good,
    VeryGood,
    Excellent,
}

impl FitnessLevel {
    pub const ALL: [FitnessLevel; 5] = [
        FitnessLevel::Low,
        FitnessLevel::Medium,
        FitnessLevel::Good,
        FitnessLevel::VeryGood,
        FitnessLevel::Excellent,
    ];
}

/// Path between two consecutive waypoints, as returned by the segment router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub start: Point,
    pub end: Point,
    pub geometry: Vec<Coordinate>,
    pub length_m: f64,
    pub length_by_surface: BTreeMap<RoadSurfaceType, f64>,
}

impl Route {
    pub fn surface_length(&self, surface: RoadSurfaceType) -> f64 {
        self.length_by_surface.get(&surface).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub waypoints: Vec<Point>,
    pub bike_type: BikeType,
    #[serde(default)]
    pub fitness_level: FitnessLevel,
    #[serde(default = "default_daily_distance_km")]
    pub daily_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripResponse {
    pub days: Vec<Vec<Route>>,
    /// `days`, flattened in waypoint order.
    pub routes: Vec<Route>,
    pub day_endpoints: Vec<Point>,
    pub total_length_m: f64,
    pub estimated_time_s: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<RouteBounds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayEndpointsRequest {
    pub routes: Vec<Route>,
    #[serde(default = "default_daily_distance_km")]
    pub daily_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEstimateRequest {
    pub distance_m: f64,
    pub bike_type: BikeType,
    pub surface: RoadSurfaceType,
    #[serde(default)]
    pub fitness_level: FitnessLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEstimateResponse {
    pub seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_label() -> String {
    "Default Point".to_string()
}

pub fn default_daily_distance_km() -> f64 {
    40.0
}
