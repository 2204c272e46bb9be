use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use petgraph::{
    algo::astar,
    graph::{DiGraph, EdgeReference, NodeIndex},
    visit::{EdgeFiltered, EdgeRef},
};
use serde::{Deserialize, Serialize};
use shared::{Coordinate, RoadSurfaceType};

use crate::{
    corridor::GRID_SCALE,
    error::RouteError,
    geo_utils::haversine_m,
    network::{GraphNode, PathEdge, PathQuery, RoadNetwork, reverse_direction_sign},
};

/// Serialized road network, the same shape as the routing store's tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkFile {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: i64,
    pub to: i64,
    pub surface: RoadSurfaceType,
    pub length_m: f64,
    /// Only the sign matters: negative means the edge is one-way.
    #[serde(default = "default_reverse_cost")]
    pub reverse_cost: f64,
    /// Intermediate shape points between `from` and `to`.
    #[serde(default)]
    pub waypoints: Vec<Coordinate>,
}

fn default_reverse_cost() -> f64 {
    1.0
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkLoadError {
    #[error("failed to read network file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid network definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("network is empty")]
    EmptyNetwork,
    #[error("edge references unknown node {0}")]
    MissingNode(i64),
    #[error("node {id} has invalid coordinates ({lat}, {lon})")]
    InvalidCoordinate { id: i64, lat: f64, lon: f64 },
    #[error("edge {from} -> {to} has invalid length {length_m}")]
    InvalidLength { from: i64, to: i64, length_m: f64 },
}

#[derive(Clone, Debug)]
struct NodeData {
    id: i64,
    coord: Coordinate,
}

#[derive(Clone, Debug)]
struct EdgeData {
    surface: RoadSurfaceType,
    length_m: f64,
    /// Quantized midpoint, matching the store's `grid_lon` / `grid_lat`.
    grid: (i64, i64),
    /// Full shape in travel direction, endpoints included.
    geometry: Vec<Coordinate>,
}

/// In-process road network: directed A* over a petgraph graph, with a KD-tree
/// for nearest-node lookups. Applies the same corridor predicate and cost
/// expression as the pgRouting store.
pub struct InMemoryNetwork {
    graph: DiGraph<NodeData, EdgeData>,
    id_to_index: HashMap<i64, NodeIndex>,
    spatial_index: KdTree<f64, NodeIndex, [f64; 2]>,
}

impl InMemoryNetwork {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NetworkLoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, NetworkLoadError> {
        let network_file: NetworkFile = serde_json::from_reader(reader)?;
        Self::from_network_file(network_file)
    }

    pub fn from_network_file(network_file: NetworkFile) -> Result<Self, NetworkLoadError> {
        if network_file.nodes.is_empty() {
            return Err(NetworkLoadError::EmptyNetwork);
        }
        let mut graph = DiGraph::new();
        let mut id_to_index = HashMap::with_capacity(network_file.nodes.len());
        let mut spatial_index = KdTree::new(2);

        for node in network_file.nodes {
            let invalid = NetworkLoadError::InvalidCoordinate {
                id: node.id,
                lat: node.lat,
                lon: node.lon,
            };
            if !node.lat.is_finite() || !node.lon.is_finite() {
                return Err(invalid);
            }
            let coord = Coordinate {
                lat: node.lat,
                lon: node.lon,
            };
            let idx = graph.add_node(NodeData { id: node.id, coord });
            id_to_index.insert(node.id, idx);
            // Stored as [lon, lat], like the store's geometry column
            spatial_index
                .add([coord.lon, coord.lat], idx)
                .map_err(|_| invalid)?;
        }

        for edge in network_file.edges {
            let from = *id_to_index
                .get(&edge.from)
                .ok_or(NetworkLoadError::MissingNode(edge.from))?;
            let to = *id_to_index
                .get(&edge.to)
                .ok_or(NetworkLoadError::MissingNode(edge.to))?;
            if !edge.length_m.is_finite() || edge.length_m < 0.0 {
                return Err(NetworkLoadError::InvalidLength {
                    from: edge.from,
                    to: edge.to,
                    length_m: edge.length_m,
                });
            }

            let a = graph[from].coord;
            let b = graph[to].coord;
            let grid = (
                ((a.lon + b.lon) / 2.0 * GRID_SCALE).round() as i64,
                ((a.lat + b.lat) / 2.0 * GRID_SCALE).round() as i64,
            );
            let mut geometry = Vec::with_capacity(edge.waypoints.len() + 2);
            geometry.push(a);
            geometry.extend_from_slice(&edge.waypoints);
            geometry.push(b);

            if reverse_direction_sign(edge.reverse_cost) > 0.0 {
                let reversed = geometry.iter().rev().copied().collect();
                graph.add_edge(
                    to,
                    from,
                    EdgeData {
                        surface: edge.surface,
                        length_m: edge.length_m,
                        grid,
                        geometry: reversed,
                    },
                );
            }
            graph.add_edge(
                from,
                to,
                EdgeData {
                    surface: edge.surface,
                    length_m: edge.length_m,
                    grid,
                    geometry,
                },
            );
        }

        tracing::info!(
            "in-memory network ready: {} nodes, {} directed edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self {
            graph,
            id_to_index,
            spatial_index,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn index_of(&self, id: i64) -> Option<NodeIndex> {
        self.id_to_index.get(&id).copied()
    }
}

impl RoadNetwork for InMemoryNetwork {
    fn nearest_node(&self, coord: Coordinate) -> Result<Option<GraphNode>, RouteError> {
        let nearest = self
            .spatial_index
            .nearest(&[coord.lon, coord.lat], 1, &squared_euclidean)
            .map_err(|err| RouteError::EngineUnavailable(format!("spatial index: {err:?}")))?;

        let Some((_, &idx)) = nearest.first() else {
            return Ok(None);
        };
        let node = &self.graph[idx];
        Ok(Some(GraphNode {
            id: node.id,
            coord: node.coord,
        }))
    }

    fn shortest_path(&self, query: &PathQuery) -> Result<Vec<PathEdge>, RouteError> {
        let (Some(start), Some(end)) = (self.index_of(query.start_node), self.index_of(query.end_node))
        else {
            return Ok(Vec::new());
        };
        if start == end {
            return Ok(Vec::new());
        }

        let admitted: Vec<bool> = self
            .graph
            .edge_weights()
            .map(|edge| query.corridor.admits_grid(edge.grid.0, edge.grid.1))
            .collect();
        let filtered = EdgeFiltered::from_fn(&self.graph, |edge: EdgeReference<'_, EdgeData>| {
            admitted[edge.id().index()]
        });

        let edge_cost = |edge: EdgeReference<'_, EdgeData>| {
            query.cost.forward(edge.weight().surface, edge.weight().length_m)
        };
        let goal = self.graph[end].coord;
        let min_weight = query.cost.weights.min_weight();
        let heuristic = |idx: NodeIndex| haversine_m(self.graph[idx].coord, goal) * min_weight;

        let Some((_cost, nodes)) = astar(&filtered, start, |n| n == end, edge_cost, heuristic) else {
            tracing::debug!(
                "no path between nodes {} and {} inside corridor ({} of {} edges admitted)",
                query.start_node,
                query.end_node,
                admitted.iter().filter(|a| **a).count(),
                admitted.len()
            );
            return Ok(Vec::new());
        };

        let edges = nodes
            .windows(2)
            .filter_map(|pair| {
                self.graph
                    .edges_connecting(pair[0], pair[1])
                    .filter(|edge| admitted[edge.id().index()])
                    .min_by(|x, y| edge_cost(*x).total_cmp(&edge_cost(*y)))
            })
            .map(|edge| {
                let data = edge.weight();
                PathEdge {
                    geometry: data.geometry.clone(),
                    surface: data.surface,
                    length_m: data.length_m,
                }
            })
            .collect();

        Ok(edges)
    }
}
