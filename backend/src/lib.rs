pub mod config;
pub mod corridor;
pub mod cost_model;
pub mod day_planner;
pub mod error;
pub mod geo_utils;
pub mod memory_network;
pub mod network;
pub mod pgrouting;
pub mod router;
pub mod trip;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use shared::{
    ApiError, DayEndpointsRequest, Point, TimeEstimateRequest, TimeEstimateResponse, TripRequest, TripResponse,
};
use tower_http::cors::{Any, CorsLayer};

use crate::day_planner::{calculate_day_endpoints, estimate_route_time_s};
use crate::error::RouteError;
use crate::geo_utils::route_bounds;
use crate::trip::TripBuilder;

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripBuilder>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/trip", post(trip_handler))
        .route("/api/day-endpoints", post(day_endpoints_handler))
        .route("/api/estimate-time", post(estimate_time_handler))
        .layer(cors)
        .with_state(state)
}

/// Accepted range for the daily riding distance.
pub const MIN_DAILY_DISTANCE_KM: f64 = 10.0;
pub const MAX_DAILY_DISTANCE_KM: f64 = 300.0;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn trip_handler(State(state): State<AppState>, Json(req): Json<TripRequest>) -> ApiResult<TripResponse> {
    let daily_distance_m = daily_distance_m(req.daily_distance_km).map_err(api_error)?;
    tracing::info!(
        "trip request: {} waypoints, {:?}, {} km/day",
        req.waypoints.len(),
        req.bike_type,
        req.daily_distance_km
    );

    let trips = state.trips.clone();
    let response = tokio::task::spawn_blocking(move || plan_trip(&trips, &req, daily_distance_m))
        .await
        .map_err(join_error)?
        .map_err(api_error)?;

    Ok(Json(response))
}

fn plan_trip(trips: &TripBuilder, req: &TripRequest, daily_distance_m: f64) -> Result<TripResponse, RouteError> {
    let days = trips.build_trip_days(&req.waypoints, req.bike_type)?;
    let routes: Vec<_> = days.iter().flatten().cloned().collect();

    let day_endpoints = calculate_day_endpoints(&routes, daily_distance_m);
    let total_length_m = routes.iter().map(|r| r.length_m).sum();
    let estimated_time_s = routes
        .iter()
        .map(|r| estimate_route_time_s(r, req.bike_type, req.fitness_level, trips.cost_model()))
        .sum();
    let bounds = route_bounds(&routes);

    Ok(TripResponse {
        days,
        routes,
        day_endpoints,
        total_length_m,
        estimated_time_s,
        bounds,
    })
}

async fn day_endpoints_handler(Json(req): Json<DayEndpointsRequest>) -> ApiResult<Vec<Point>> {
    let daily_distance_m = daily_distance_m(req.daily_distance_km).map_err(api_error)?;
    let points = tokio::task::spawn_blocking(move || calculate_day_endpoints(&req.routes, daily_distance_m))
        .await
        .map_err(join_error)?;
    Ok(Json(points))
}

async fn estimate_time_handler(
    State(state): State<AppState>,
    Json(req): Json<TimeEstimateRequest>,
) -> ApiResult<TimeEstimateResponse> {
    if !req.distance_m.is_finite() || req.distance_m < 0.0 {
        return Err(api_error(RouteError::InvalidInput(format!(
            "distance must be a non-negative number of metres, got {}",
            req.distance_m
        ))));
    }
    let seconds =
        state
            .trips
            .cost_model()
            .estimate_time_seconds(req.distance_m, req.bike_type, req.surface, req.fitness_level);
    Ok(Json(TimeEstimateResponse { seconds }))
}

fn daily_distance_m(daily_distance_km: f64) -> Result<f64, RouteError> {
    if (MIN_DAILY_DISTANCE_KM..=MAX_DAILY_DISTANCE_KM).contains(&daily_distance_km) {
        Ok(daily_distance_km * 1000.0)
    } else {
        Err(RouteError::InvalidInput(format!(
            "daily distance must be between {MIN_DAILY_DISTANCE_KM} and {MAX_DAILY_DISTANCE_KM} km, got {daily_distance_km} km"
        )))
    }
}

fn join_error(err: tokio::task::JoinError) -> (StatusCode, Json<ApiError>) {
    tracing::error!("blocking task failed: {err}");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "blocking task failed".into())
}

fn status_for(err: &RouteError) -> StatusCode {
    match err {
        RouteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RouteError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
        RouteError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RouteError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RouteError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn api_error(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("request failed: {err}");
    } else {
        tracing::debug!("request rejected: {err}");
    }
    error_body(status, err.to_string())
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { message }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn errors_map_to_distinct_statuses() {
        let start = Point::new(45.0, 5.0);
        let end = Point::new(46.0, 5.0);
        assert_eq!(status_for(&RouteError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&RouteError::no_route(&start, &end)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&RouteError::Config(ConfigError::MissingBike(shared::BikeType::Road))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&RouteError::EngineUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RouteError::EngineTimeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn daily_distance_must_be_in_range() {
        assert_eq!(daily_distance_m(40.0).unwrap(), 40_000.0);
        assert_eq!(daily_distance_m(MIN_DAILY_DISTANCE_KM).unwrap(), 10_000.0);
        assert_eq!(daily_distance_m(MAX_DAILY_DISTANCE_KM).unwrap(), 300_000.0);
        assert!(daily_distance_m(0.0).is_err());
        assert!(daily_distance_m(1e-9).is_err());
        assert!(daily_distance_m(9.99).is_err());
        assert!(daily_distance_m(300.5).is_err());
        assert!(daily_distance_m(f64::NAN).is_err());
        assert!(daily_distance_m(f64::INFINITY).is_err());
    }
}
