use crate::topology::entity::EntityRef;
use crate::topology::store::EdgeId;

/// Errors from the topology kernel.
///
/// Stale references (undecodable topology names, entities missing from a
/// restore context, absent co-edge partners) are not errors; they surface as
/// `None` or as no-ops.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("a request is already open")]
    TransactionAlreadyOpen,

    #[error("no request is open")]
    NoOpenTransaction,

    #[error("cannot undo or redo while a request is open")]
    RestoreDuringTransaction,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("entity not found: {entity}")]
    EntityNotFound { entity: EntityRef },

    #[error("a loop needs at least 3 points, got {count}")]
    DegenerateLoop { count: usize },

    #[error("edge {edge:?} already has two co-edges")]
    TooManyCoEdges { edge: EdgeId },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::Serialization(err.to_string())
    }
}
