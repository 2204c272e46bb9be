use geo::{Distance, Geodesic, Haversine, Point as GeoPoint};
use shared::{Coordinate, Point, Route, RouteBounds};

fn to_geo(coord: Coordinate) -> GeoPoint<f64> {
    GeoPoint::new(coord.lon, coord.lat)
}

/// Great-circle distance in metres; cheap, used as the search heuristic.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(to_geo(a), to_geo(b))
}

/// Ellipsoidal (WGS84) distance in metres.
pub fn geodesic_m(a: Coordinate, b: Coordinate) -> f64 {
    Geodesic.distance(to_geo(a), to_geo(b))
}

pub fn path_length_m(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| geodesic_m(w[0], w[1])).sum()
}

/// Bounding box of every route geometry, `None` when there is no vertex.
pub fn route_bounds(routes: &[Route]) -> Option<RouteBounds> {
    let mut coords = routes.iter().flat_map(|route| route.geometry.iter());
    let first = coords.next()?;
    let init = RouteBounds {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lon: first.lon,
        max_lon: first.lon,
    };
    Some(coords.fold(init, |bounds, c| RouteBounds {
        min_lat: bounds.min_lat.min(c.lat),
        max_lat: bounds.max_lat.max(c.lat),
        min_lon: bounds.min_lon.min(c.lon),
        max_lon: bounds.max_lon.max(c.lon),
    }))
}

/// First candidate closer than `max_m` metres to `target`, in candidate order.
pub fn find_nearby<'a>(target: Coordinate, candidates: &'a [Point], max_m: f64) -> Option<&'a Point> {
    candidates
        .iter()
        .find(|candidate| geodesic_m(target, candidate.coordinate()) < max_m)
}
