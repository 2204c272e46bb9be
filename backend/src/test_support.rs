//! Scripted road network for exercising routing without a store.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use shared::{Coordinate, RoadSurfaceType};

use crate::{
    error::RouteError,
    geo_utils::haversine_m,
    network::{GraphNode, PathEdge, PathQuery, RoadNetwork},
};

/// Every registered coordinate is a node (id = registration index) and every
/// node pair is connected by a two-edge path: paved to the midpoint, unpaved
/// from there on. Pairs can be scripted to fail or to be slow.
pub struct ScriptedNetwork {
    nodes: Vec<Coordinate>,
    no_path: HashSet<(i64, i64)>,
    delays: HashMap<(i64, i64), Duration>,
    unavailable: bool,
    calls: AtomicUsize,
    completed: Mutex<Vec<(i64, i64)>>,
    last_query: Mutex<Option<PathQuery>>,
}

impl ScriptedNetwork {
    pub fn new(nodes: &[Coordinate]) -> Self {
        Self {
            nodes: nodes.to_vec(),
            no_path: HashSet::new(),
            delays: HashMap::new(),
            unavailable: false,
            calls: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
            last_query: Mutex::new(None),
        }
    }

    pub fn without_path(mut self, from: i64, to: i64) -> Self {
        self.no_path.insert((from, to));
        self
    }

    pub fn with_delay(mut self, from: i64, to: i64, delay: Duration) -> Self {
        self.delays.insert((from, to), delay);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Node pairs in the order their searches finished.
    pub fn completion_order(&self) -> Vec<(i64, i64)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<PathQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

impl RoadNetwork for ScriptedNetwork {
    fn nearest_node(&self, coord: Coordinate) -> Result<Option<GraphNode>, RouteError> {
        let nearest = self
            .nodes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| haversine_m(**a, coord).total_cmp(&haversine_m(**b, coord)));
        Ok(nearest.map(|(idx, coord)| GraphNode {
            id: idx as i64,
            coord: *coord,
        }))
    }

    fn shortest_path(&self, query: &PathQuery) -> Result<Vec<PathEdge>, RouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());
        let pair = (query.start_node, query.end_node);

        if let Some(delay) = self.delays.get(&pair) {
            thread::sleep(*delay);
        }
        self.completed.lock().unwrap().push(pair);

        if self.unavailable {
            return Err(RouteError::EngineUnavailable("connection refused".into()));
        }
        if self.no_path.contains(&pair) {
            return Ok(Vec::new());
        }

        let a = self.nodes[query.start_node as usize];
        let b = self.nodes[query.end_node as usize];
        let mid = a.interpolate(b, 0.5);
        Ok(vec![
            PathEdge {
                geometry: vec![a, mid],
                surface: RoadSurfaceType::Paved,
                length_m: haversine_m(a, mid),
            },
            PathEdge {
                geometry: vec![mid, b],
                surface: RoadSurfaceType::Unpaved,
                length_m: haversine_m(mid, b),
            },
        ])
    }
}
