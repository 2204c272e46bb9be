// Module pgrouting - RoadNetwork backed by a PostGIS/pgRouting database
// Tables follow the osm2pgrouting layout: `ways` (gid, source, target, length,
// reverse_cost, road_type, grid_lon, grid_lat, x1..y2, the_geom) and
// `ways_vertices_pgr` (id, lat, lon, the_geom).

use std::{fmt::Write as _, future::Future, time::Duration};

use serde::Deserialize;
use shared::{Coordinate, RoadSurfaceType};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tokio::runtime::Handle;

use crate::{
    error::RouteError,
    network::{GraphNode, PathEdge, PathQuery, RoadNetwork},
};

const NEAREST_VERTEX_SQL: &str = r#"
SELECT id, lat::float8 AS lat, lon::float8 AS lon
FROM ways_vertices_pgr "vert"
ORDER BY vert.the_geom <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)::geometry ASC
LIMIT 1
"#;

const SHORTEST_PATH_SQL: &str = r#"
SELECT
    ST_AsGeoJSON(rd.the_geom) AS geojson,
    ST_Length(rd.the_geom::geography) AS length_m,
    rd.road_type AS road_type,
    (path.node = rd.source) AS forward
FROM pgr_bdAstar($1, $2::bigint, $3::bigint, directed => $4, heuristic => 4) AS path
INNER JOIN ways rd ON path.edge = rd.gid
ORDER BY path.seq
"#;

#[derive(Debug, FromRow)]
struct VertexRow {
    id: i64,
    lat: f64,
    lon: f64,
}

#[derive(Debug, FromRow)]
struct PathRow {
    geojson: String,
    length_m: f64,
    road_type: String,
    forward: bool,
}

#[derive(Debug, Deserialize)]
struct GeoJsonLineString {
    coordinates: Vec<[f64; 2]>,
}

/// pgRouting store behind the blocking [`RoadNetwork`] interface.
///
/// Calls are issued from routing worker threads and driven to completion on
/// the tokio runtime the pool was created on. Must not be called from inside
/// that runtime's async tasks.
pub struct PgRoutingNetwork {
    pool: PgPool,
    runtime: Handle,
    timeout: Option<Duration>,
}

impl PgRoutingNetwork {
    /// Open a connection pool; must run inside the tokio runtime.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, RouteError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("connected to routing database ({max_connections} connections max)");
        Ok(Self::from_pool(pool, Handle::current(), timeout))
    }

    pub fn from_pool(pool: PgPool, runtime: Handle, timeout: Option<Duration>) -> Self {
        Self {
            pool,
            runtime,
            timeout,
        }
    }

    fn run<T, F>(&self, fut: F) -> Result<T, RouteError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        self.runtime.block_on(async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result.map_err(RouteError::from),
                    Err(_) => Err(RouteError::EngineTimeout(limit)),
                },
                None => fut.await.map_err(RouteError::from),
            }
        })
    }
}

impl RoadNetwork for PgRoutingNetwork {
    fn nearest_node(&self, coord: Coordinate) -> Result<Option<GraphNode>, RouteError> {
        let row = self.run(
            sqlx::query_as::<_, VertexRow>(NEAREST_VERTEX_SQL)
                .bind(coord.lon)
                .bind(coord.lat)
                .fetch_optional(&self.pool),
        )?;
        Ok(row.map(|v| GraphNode {
            id: v.id,
            coord: Coordinate::new(v.lat, v.lon),
        }))
    }

    fn shortest_path(&self, query: &PathQuery) -> Result<Vec<PathEdge>, RouteError> {
        let edges_sql = edges_sql(query);
        let rows = self
            .run(
                sqlx::query_as::<_, PathRow>(SHORTEST_PATH_SQL)
                    .bind(&edges_sql)
                    .bind(query.start_node)
                    .bind(query.end_node)
                    .bind(query.directed)
                    .fetch_all(&self.pool),
            )
            .inspect_err(|err| tracing::error!("pgr_bdAstar {} -> {} failed: {err}", query.start_node, query.end_node))?;

        rows.into_iter().map(path_edge).collect()
    }
}

fn path_edge(row: PathRow) -> Result<PathEdge, RouteError> {
    let line: GeoJsonLineString = serde_json::from_str(&row.geojson)
        .map_err(|err| RouteError::EngineUnavailable(format!("malformed edge geometry: {err}")))?;
    let mut geometry: Vec<Coordinate> = line
        .coordinates
        .into_iter()
        .map(|[lon, lat]| Coordinate::new(lat, lon))
        .collect();
    if !row.forward {
        geometry.reverse();
    }

    let surface = RoadSurfaceType::from_store_tag(&row.road_type).unwrap_or_else(|| {
        tracing::warn!("unknown road type '{}', treated as unknown surface", row.road_type);
        RoadSurfaceType::UnknownSurface
    });

    Ok(PathEdge {
        geometry,
        surface,
        length_m: row.length_m,
    })
}

/// Edge query handed to pgRouting: weighted costs over the corridor's ways.
///
/// Rendered as text because pgRouting takes the edge set as SQL; every
/// interpolated value is a finite float.
pub fn edges_sql(query: &PathQuery) -> String {
    let weights = &query.cost.weights;
    let corridor = &query.corridor;

    let mut cost = String::from("CASE");
    for (surface, weight) in weights.iter() {
        let _ = write!(cost, " WHEN road_type = '{}' THEN {:?} * length", surface.store_tag(), weight);
    }
    let _ = write!(cost, " ELSE {:?} * length END", weights.weight(RoadSurfaceType::UnknownSurface));

    let bounds = corridor.grid_bounds();
    let mut filter = format!(
        "grid_lon BETWEEN {:?} AND {:?} AND grid_lat BETWEEN {:?} AND {:?}",
        bounds.min_lon, bounds.max_lon, bounds.min_lat, bounds.max_lat
    );
    if !corridor.is_degenerate() {
        let (lower, upper) = corridor.line_bounds();
        let _ = write!(
            filter,
            " AND {a:?} * grid_lon + {b:?} * grid_lat > {lower:?} AND {a:?} * grid_lon + {b:?} * grid_lat < {upper:?}",
            a = corridor.factor_a,
            b = corridor.factor_b,
        );
    }

    format!(
        "SELECT sq.id, sq.source, sq.target, sq.cost, \
         CASE WHEN sq.stored_reverse < 0 THEN -1.0 ELSE 1.0 END * sq.cost AS reverse_cost, \
         sq.x1, sq.y1, sq.x2, sq.y2 \
         FROM (SELECT gid AS id, source, target, {cost} AS cost, reverse_cost AS stored_reverse, \
         x1, y1, x2, y2 FROM ways WHERE {filter}) AS sq"
    )
}
