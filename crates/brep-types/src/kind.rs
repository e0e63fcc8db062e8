use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of topological entity tracked by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityKind {
    Vertex,
    Edge,
    CoEdge,
    Loop,
    Face,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vertex => "Vertex",
            EntityKind::Edge => "Edge",
            EntityKind::CoEdge => "CoEdge",
            EntityKind::Loop => "Loop",
            EntityKind::Face => "Face",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
