use serde::Serialize;

use crate::vehicle::EdgeId;

/// Contiguous sequence of edges produced by stitching. Routes are replaced
/// wholesale, never edited.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Route {
    edges: Vec<EdgeId>,
}

impl Route {
    pub(crate) fn new(edges: Vec<EdgeId>) -> Self {
        Route { edges }
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn first_edge(&self) -> Option<&EdgeId> {
        self.edges.first()
    }

    pub fn last_edge(&self) -> Option<&EdgeId> {
        self.edges.last()
    }
}
