//! Topology kernel for room and wall modeling: an arena of vertices, edges,
//! co-edges, loops and faces, with per-entity transaction states so that every
//! edit can be undone, redone and re-propagated to dependent geometry.

pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod invalidate;
pub mod topology;
pub mod txn;

pub use config::KernelConfig;
pub use context::{IdGenerator, KernelContext};
pub use error::KernelError;
pub use invalidate::{propagate_dirty, refresh_geometry};
pub use topology::coedge::{CoEdgeView, find_coedge_by_topo_name};
pub use topology::entity::EntityRef;
pub use topology::face_util::update_isolate_face;
pub use topology::loops::update_loop_by_points;
pub use topology::store::{CoEdgeId, EdgeId, EntityStore, FaceId, LoopId, VertexId};
pub use txn::manager::{CommitSummary, TransactionManager};
pub use txn::request::{Request, StateRequest};
pub use txn::state::{EntityTxnState, TxnState};

use serde::{Deserialize, Serialize};

use geometry::point::Point3d;

/// Tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Points closer than this are considered coincident (meters).
    pub coincidence: f64,
    /// Angles smaller than this (radians) are considered zero.
    pub angular: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            angular: 1e-10,
        }
    }
}

impl Tolerance {
    pub fn points_coincident(&self, a: &Point3d, b: &Point3d) -> bool {
        a.distance_to(b) < self.coincidence
    }

    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() < self.coincidence
    }
}
