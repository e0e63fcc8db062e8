//! Per-document services passed explicitly into kernel entry points.

use serde::{Deserialize, Serialize};

use crate::config::KernelConfig;
use crate::topology::store::EntityStore;

/// Issues the numeric edge ids written into topology names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    next: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a fresh id.
    pub fn generate(&mut self) -> i64 {
        let id = self.next;
        self.next = id.saturating_add(1);
        id
    }

    /// Make sure `id` is never handed out again.
    pub fn reserve(&mut self, id: i64) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }

    /// Reserve every edge id already present in `store`, e.g. after loading.
    pub fn sync_with(&mut self, store: &EntityStore) {
        for (_, edge) in store.edges() {
            self.reserve(edge.persistent_id);
        }
    }

    pub fn peek(&self) -> i64 {
        self.next
    }
}

/// Services owned by one document. Tests and documents each get their own.
#[derive(Debug, Clone, Default)]
pub struct KernelContext {
    pub config: KernelConfig,
    pub ids: IdGenerator,
}

impl KernelContext {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            ids: IdGenerator::new(),
        }
    }
}
