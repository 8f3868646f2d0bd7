use std::path::Path;

use fleet_core::{
    define_index_newtype,
    engine::EngineError,
    units::{Kmh, Meters},
    vehicle::{EdgeId, LocationId, VehicleClass},
};
use fxhash::FxHashMap;
use geo::{Distance, Euclidean};
use petgraph::{
    algo::astar,
    graph::{DiGraph, NodeIndex},
    visit::{EdgeFiltered, EdgeRef},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::projection::GeoOrigin;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to read network file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse network JSON")]
    Json(#[from] serde_json::Error),

    #[error("Junction {0} is defined twice")]
    DuplicateJunction(String),

    #[error("Edge {0} is defined twice")]
    DuplicateEdge(EdgeId),

    #[error("Vehicle class {0} is defined twice")]
    DuplicateVehicleClass(VehicleClass),

    #[error("Edge {edge} references unknown junction {junction}")]
    UnknownJunction { edge: EdgeId, junction: String },

    #[error("Invalid edge {edge}: {reason}")]
    InvalidEdge { edge: EdgeId, reason: String },

    #[error("Invalid vehicle class {class}: {reason}")]
    InvalidVehicleClass { class: VehicleClass, reason: String },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JunctionDefinition {
    pub id: String,
    /// Metres east of the origin.
    pub x: f64,
    /// Metres north of the origin.
    pub y: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EdgeDefinition {
    pub id: EdgeId,
    pub from: String,
    pub to: String,
    pub speed_limit_kmh: f64,
    /// Classes allowed on the edge. Every class when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<VehicleClass>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VehicleClassDefinition {
    pub id: VehicleClass,
    pub max_speed_kmh: f64,
    /// Acceleration and deceleration in m/s².
    pub accel: f64,
}

/// Network file contents.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkDefinition {
    pub origin: GeoOrigin,
    pub junctions: Vec<JunctionDefinition>,
    pub edges: Vec<EdgeDefinition>,
    pub vehicle_classes: Vec<VehicleClassDefinition>,
}

pub struct Junction {
    pub id: String,
    pub point: geo::Point,
}

define_index_newtype!(JunctionIdx, Junction);

pub struct Edge {
    pub id: EdgeId,
    pub from: JunctionIdx,
    pub to: JunctionIdx,
    pub length: Meters,
    pub speed_limit: Kmh,
    allowed: Vec<VehicleClass>,
}

impl Edge {
    pub fn allows(&self, vehicle_class: &VehicleClass) -> bool {
        self.allowed.is_empty() || self.allowed.contains(vehicle_class)
    }
}

define_index_newtype!(EdgeIdx, Edge);

/// Road network: junctions in metric coordinates connected by directed edges.
pub struct Network {
    origin: GeoOrigin,
    junctions: Vec<Junction>,
    edges: Vec<Edge>,
    edge_index: FxHashMap<EdgeId, EdgeIdx>,
    vehicle_classes: FxHashMap<VehicleClass, VehicleClassDefinition>,
    graph: DiGraph<JunctionIdx, EdgeIdx>,
}

impl Network {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| NetworkError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let definition: NetworkDefinition = serde_json::from_str(&content)?;
        let network = Self::from_definition(definition)?;

        info!(
            "Loaded network {}: {} junctions, {} edges",
            path.display(),
            network.junctions.len(),
            network.edges.len()
        );

        Ok(network)
    }

    pub fn from_definition(definition: NetworkDefinition) -> Result<Self, NetworkError> {
        let mut graph = DiGraph::with_capacity(definition.junctions.len(), definition.edges.len());
        let mut junctions = Vec::with_capacity(definition.junctions.len());
        let mut junction_index: FxHashMap<String, JunctionIdx> = FxHashMap::default();

        for junction in definition.junctions {
            if junction_index.contains_key(&junction.id) {
                return Err(NetworkError::DuplicateJunction(junction.id));
            }

            let junction_idx = JunctionIdx::new(junctions.len());
            junction_index.insert(junction.id.clone(), junction_idx);
            graph.add_node(junction_idx);
            junctions.push(Junction {
                id: junction.id,
                point: geo::Point::new(junction.x, junction.y),
            });
        }

        let mut edges: Vec<Edge> = Vec::with_capacity(definition.edges.len());
        let mut edge_index = FxHashMap::default();

        for edge in definition.edges {
            if edge_index.contains_key(&edge.id) {
                return Err(NetworkError::DuplicateEdge(edge.id));
            }

            let lookup = |junction: &String| {
                junction_index
                    .get(junction)
                    .copied()
                    .ok_or_else(|| NetworkError::UnknownJunction {
                        edge: edge.id.clone(),
                        junction: junction.clone(),
                    })
            };
            let from = lookup(&edge.from)?;
            let to = lookup(&edge.to)?;

            if !(edge.speed_limit_kmh.is_finite() && edge.speed_limit_kmh > 0.0) {
                return Err(NetworkError::InvalidEdge {
                    edge: edge.id,
                    reason: format!("speed limit must be positive, got {}", edge.speed_limit_kmh),
                });
            }

            let length = Euclidean.distance(&junctions[from].point, &junctions[to].point);
            if length <= 0.0 {
                return Err(NetworkError::InvalidEdge {
                    edge: edge.id,
                    reason: String::from("zero length"),
                });
            }

            let edge_idx = EdgeIdx::new(edges.len());
            edge_index.insert(edge.id.clone(), edge_idx);
            graph.add_edge(NodeIndex::new(from.get()), NodeIndex::new(to.get()), edge_idx);
            edges.push(Edge {
                id: edge.id,
                from,
                to,
                length: Meters::new(length),
                speed_limit: Kmh::new(edge.speed_limit_kmh),
                allowed: edge.allowed,
            });
        }

        let mut vehicle_classes = FxHashMap::default();
        for class in definition.vehicle_classes {
            if !(class.max_speed_kmh > 0.0 && class.accel > 0.0) {
                return Err(NetworkError::InvalidVehicleClass {
                    class: class.id,
                    reason: String::from("max speed and acceleration must be positive"),
                });
            }
            if vehicle_classes.contains_key(&class.id) {
                return Err(NetworkError::DuplicateVehicleClass(class.id));
            }
            vehicle_classes.insert(class.id.clone(), class);
        }

        Ok(Network {
            origin: definition.origin,
            junctions,
            edges,
            edge_index,
            vehicle_classes,
            graph,
        })
    }

    pub fn origin(&self) -> &GeoOrigin {
        &self.origin
    }

    pub fn junction(&self, junction_idx: JunctionIdx) -> &Junction {
        &self.junctions[junction_idx]
    }

    pub fn edge(&self, edge_idx: EdgeIdx) -> &Edge {
        &self.edges[edge_idx]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_idx(&self, edge_id: &EdgeId) -> Option<EdgeIdx> {
        self.edge_index.get(edge_id).copied()
    }

    pub fn vehicle_class(&self, vehicle_class: &VehicleClass) -> Option<&VehicleClassDefinition> {
        self.vehicle_classes.get(vehicle_class)
    }

    /// Speed a vehicle of the class aims for on the edge, in m/s.
    pub fn target_speed(&self, edge_idx: EdgeIdx, class: &VehicleClassDefinition) -> f64 {
        let limit = self.edges[edge_idx].speed_limit.value();
        Kmh::new(limit.min(class.max_speed_kmh)).meters_per_second()
    }

    fn travel_time(&self, edge_idx: EdgeIdx, class: &VehicleClassDefinition) -> f64 {
        self.edges[edge_idx].length.value() / self.target_speed(edge_idx, class)
    }

    /// Fastest path starting with the edge `from` and ending with the edge
    /// `to`, using only edges open to the class. Empty when there is none.
    pub fn find_path(
        &self,
        from: &LocationId,
        to: &LocationId,
        vehicle_class: &VehicleClass,
    ) -> Result<Vec<EdgeId>, EngineError> {
        let edge_idx = |location: &LocationId| {
            self.edge_idx(&EdgeId::new(location.as_str()))
                .ok_or_else(|| EngineError::UnknownLocation(location.clone()))
        };
        let from_idx = edge_idx(from)?;
        let to_idx = edge_idx(to)?;

        let class = self
            .vehicle_class(vehicle_class)
            .ok_or_else(|| EngineError::UnknownVehicleClass(vehicle_class.clone()))?;

        if !self.edges[from_idx].allows(vehicle_class) || !self.edges[to_idx].allows(vehicle_class) {
            return Ok(Vec::new());
        }

        if from_idx == to_idx {
            return Ok(vec![self.edges[from_idx].id.clone()]);
        }

        let start = NodeIndex::new(self.edges[from_idx].to.get());
        let goal = NodeIndex::new(self.edges[to_idx].from.get());
        let goal_point = self.junctions[self.edges[to_idx].from].point;
        let max_speed = Kmh::new(class.max_speed_kmh).meters_per_second();

        let open_edges = EdgeFiltered::from_fn(&self.graph, |edge| {
            self.edges[*edge.weight()].allows(vehicle_class)
        });

        let Some((cost, nodes)) = astar(
            &open_edges,
            start,
            |node| node == goal,
            |edge| self.travel_time(*edge.weight(), class),
            |node| {
                let point = self.junctions[self.graph[node]].point;
                Euclidean.distance(&point, &goal_point) / max_speed
            },
        ) else {
            debug!("No path {} -> {} for {}", from, to, vehicle_class);
            return Ok(Vec::new());
        };

        let mut path = Vec::with_capacity(nodes.len() + 1);
        path.push(self.edges[from_idx].id.clone());

        for pair in nodes.windows(2) {
            let fastest = self
                .graph
                .edges_connecting(pair[0], pair[1])
                .map(|edge| *edge.weight())
                .filter(|edge_idx| self.edges[*edge_idx].allows(vehicle_class))
                .min_by(|a, b| self.travel_time(*a, class).total_cmp(&self.travel_time(*b, class)));

            match fastest {
                Some(edge_idx) => path.push(self.edges[edge_idx].id.clone()),
                None => return Ok(Vec::new()),
            }
        }

        path.push(self.edges[to_idx].id.clone());

        debug!(
            "Path {} -> {}: {} edges, {:.1}s",
            from,
            to,
            path.len(),
            cost
        );

        Ok(path)
    }
}
