use serde::{Deserialize, Serialize};

/// The semantic kind of change an entity undergoes inside one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityTransactionType {
    Creation,
    #[default]
    Modification,
    Deletion,
    /// Moved to the recycle bin; restores are skipped.
    Recycling,
}

/// Which snapshot of a transaction is currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionState {
    #[default]
    Default,
    Undo,
    Redo,
}
