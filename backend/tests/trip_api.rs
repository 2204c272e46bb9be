use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use hyper::StatusCode;
use serde_json::{Value, json};
use shared::{ApiError, Point, PointKind, RoadSurfaceType, TimeEstimateResponse, TripResponse};
use tourplan::{
    AppState, cost_model::RoadCostModel, create_router, memory_network::InMemoryNetwork, router::SegmentRouter,
    trip::TripBuilder,
};
use tower::ServiceExt;

const SAMPLE_NETWORK: &str = include_str!("../data/sample_network.json");

fn test_app() -> axum::Router {
    let network = InMemoryNetwork::from_reader(SAMPLE_NETWORK.as_bytes()).expect("network");
    let trips = TripBuilder::with_workers(
        SegmentRouter::new(Arc::new(network)),
        Arc::new(RoadCostModel::default()),
        2,
    )
    .expect("worker pool");
    create_router(AppState {
        trips: Arc::new(trips),
    })
}

async fn post(app: axum::Router, uri: &str, payload: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn trip_endpoint_routes_every_leg() {
    let payload = json!({
        "waypoints": [
            {"lat": 45.0, "lon": 5.0, "label": "Start"},
            {"lat": 45.02, "lon": 5.02, "label": "Camping", "kind": "sleep"},
            {"lat": 45.03, "lon": 5.03, "label": "Finish"}
        ],
        "bike_type": "road",
        "fitness_level": "good",
        "daily_distance_km": 10
    });

    let (status, bytes) = post(test_app(), "/api/trip", payload).await;
    assert_eq!(status, StatusCode::OK);
    let body: TripResponse = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body.days.len(), 2);
    assert_eq!(body.routes.len(), 2);
    assert_eq!(body.routes[0].end.label, "Camping");
    assert_eq!(body.routes[0].end, body.routes[1].start);

    // road bikes keep to the paved loop and the cycleway
    let first = &body.routes[0];
    assert_eq!(first.surface_length(RoadSurfaceType::Unpaved), 0.0);
    assert!(first.surface_length(RoadSurfaceType::Cycleway) > 1000.0);

    let sum: f64 = body.routes.iter().map(|r| r.length_m).sum();
    assert!((body.total_length_m - sum).abs() < 1e-6);
    assert!(body.estimated_time_s > 0);
    assert!(body.bounds.is_some());

    // about 5.2 km fits in a single day
    assert_eq!(body.day_endpoints.len(), 1);
    assert_eq!(body.day_endpoints[0].label, "Finish");
}

#[tokio::test]
async fn mountain_bikes_take_the_gravel() {
    let payload = json!({
        "waypoints": [{"lat": 45.0, "lon": 5.0}, {"lat": 45.02, "lon": 5.02}],
        "bike_type": "mtb"
    });

    let (status, bytes) = post(test_app(), "/api/trip", payload).await;
    assert_eq!(status, StatusCode::OK);
    let body: TripResponse = serde_json::from_slice(&bytes).unwrap();
    let route = &body.routes[0];
    assert!(route.surface_length(RoadSurfaceType::Unpaved) > 2000.0);
    assert_eq!(route.surface_length(RoadSurfaceType::Paved), 0.0);
}

#[tokio::test]
async fn single_waypoint_is_rejected() {
    let payload = json!({
        "waypoints": [{"lat": 45.0, "lon": 5.0}],
        "bike_type": "gravel"
    });

    let (status, bytes) = post(test_app(), "/api/trip", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: ApiError = serde_json::from_slice(&bytes).unwrap();
    assert!(body.message.contains("at least 2 waypoints"));
}

#[tokio::test]
async fn one_way_street_has_no_route_back() {
    let payload = json!({
        "waypoints": [{"lat": 45.03, "lon": 5.03}, {"lat": 45.02, "lon": 5.02}],
        "bike_type": "trekking"
    });

    let (status, bytes) = post(test_app(), "/api/trip", payload).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: ApiError = serde_json::from_slice(&bytes).unwrap();
    assert!(body.message.starts_with("no route found"));
}

#[tokio::test]
async fn daily_distance_outside_the_accepted_range_is_rejected() {
    for daily_distance_km in [0.0, 1e-9, 9.5, 301.0] {
        let payload = json!({
            "waypoints": [{"lat": 45.0, "lon": 5.0}, {"lat": 45.02, "lon": 5.02}],
            "bike_type": "road",
            "daily_distance_km": daily_distance_km
        });
        let (status, bytes) = post(test_app(), "/api/trip", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{daily_distance_km} km accepted");
        let body: ApiError = serde_json::from_slice(&bytes).unwrap();
        assert!(body.message.contains("daily distance"));
    }
}

/// Straight 0.3° meridian route from (45, 5), measured at `length_m`.
fn meridian_route(length_m: f64) -> Value {
    let geometry: Vec<Value> = (0..=30)
        .map(|i| json!({"lat": 45.0 + i as f64 * 0.01, "lon": 5.0}))
        .collect();
    json!({
        "start": {"lat": 45.0, "lon": 5.0, "label": "Valence"},
        "end": {"lat": 45.3, "lon": 5.0, "label": "Lake"},
        "geometry": geometry,
        "length_m": length_m,
        "length_by_surface": {"paved": length_m}
    })
}

#[tokio::test]
async fn day_endpoints_endpoint_splits_given_routes() {
    // 100 km of riding at 30 km a day: three overnight stops, then the end
    let payload = json!({"routes": [meridian_route(100_000.0)], "daily_distance_km": 30});
    let (status, bytes) = post(test_app(), "/api/day-endpoints", payload).await;
    assert_eq!(status, StatusCode::OK);
    let points: Vec<Point> = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(points.len(), 4);
    assert_eq!(points[0].label, "End of day 1");
    assert!(points[..3].iter().all(|p| p.kind == PointKind::Sleep));
    assert!((points[0].lat - 45.09).abs() < 1e-3, "got {}", points[0].lat);
    assert_eq!(points[3].label, "Lake");
}

#[tokio::test]
async fn day_endpoints_endpoint_rejects_tiny_daily_distance() {
    let payload = json!({"routes": [meridian_route(33_000.0)], "daily_distance_km": 0.00001});
    let (status, bytes) = post(test_app(), "/api/day-endpoints", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: ApiError = serde_json::from_slice(&bytes).unwrap();
    assert!(body.message.contains("between 10 and 300 km"));
}

#[tokio::test]
async fn estimate_time_uses_the_speed_tables() {
    let payload = json!({
        "distance_m": 10000.0,
        "bike_type": "road",
        "surface": "unpaved",
        "fitness_level": "good"
    });

    let (status, bytes) = post(test_app(), "/api/estimate-time", payload).await;
    assert_eq!(status, StatusCode::OK);
    let body: TimeEstimateResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.seconds, 2571);
}

#[tokio::test]
async fn estimate_time_rejects_negative_distance() {
    let payload = json!({
        "distance_m": -1.0,
        "bike_type": "road",
        "surface": "paved",
        "fitness_level": "good"
    });

    let (status, _) = post(test_app(), "/api/estimate-time", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
