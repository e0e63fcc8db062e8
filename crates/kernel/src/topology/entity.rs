use std::fmt;

use brep_types::EntityKind;
use serde::{Deserialize, Serialize};

use super::store::{CoEdgeId, EdgeId, FaceId, LoopId, VertexId};

/// A reference to any entity in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Vertex(VertexId),
    Edge(EdgeId),
    CoEdge(CoEdgeId),
    Loop(LoopId),
    Face(FaceId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Vertex(_) => EntityKind::Vertex,
            EntityRef::Edge(_) => EntityKind::Edge,
            EntityRef::CoEdge(_) => EntityKind::CoEdge,
            EntityRef::Loop(_) => EntityKind::Loop,
            EntityRef::Face(_) => EntityKind::Face,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Vertex(id) => write!(f, "{:?}", id),
            EntityRef::Edge(id) => write!(f, "{:?}", id),
            EntityRef::CoEdge(id) => write!(f, "{:?}", id),
            EntityRef::Loop(id) => write!(f, "{:?}", id),
            EntityRef::Face(id) => write!(f, "{:?}", id),
        }
    }
}

impl From<VertexId> for EntityRef {
    fn from(id: VertexId) -> Self {
        EntityRef::Vertex(id)
    }
}

impl From<EdgeId> for EntityRef {
    fn from(id: EdgeId) -> Self {
        EntityRef::Edge(id)
    }
}

impl From<CoEdgeId> for EntityRef {
    fn from(id: CoEdgeId) -> Self {
        EntityRef::CoEdge(id)
    }
}

impl From<LoopId> for EntityRef {
    fn from(id: LoopId) -> Self {
        EntityRef::Loop(id)
    }
}

impl From<FaceId> for EntityRef {
    fn from(id: FaceId) -> Self {
        EntityRef::Face(id)
    }
}
