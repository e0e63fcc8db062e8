use brep_types::EntityTransactionType;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::context::TxnContext;
use super::request::{Request, StateRequest};
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::topology::audit::audit_and_report;
use crate::topology::store::EntityStore;

/// Returned to the caller when a request enters history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub id: Uuid,
    pub label: String,
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn entities(&self) -> usize {
        self.created + self.modified + self.deleted
    }
}

/// Two-stack undo/redo history of committed requests.
#[derive(Debug)]
pub struct TransactionManager {
    undo: Vec<Box<dyn Request>>,
    redo: Vec<Box<dyn Request>>,
    history_limit: usize,
    audit_on_commit: bool,
    active: Option<StateRequest>,
}

impl TransactionManager {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            history_limit: config.history_limit,
            audit_on_commit: config.audit_on_commit,
            active: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Open a request. Only one request may be open at a time.
    pub fn start(&mut self, store: &mut EntityStore, label: impl Into<String>) -> Result<Uuid, KernelError> {
        if self.active.is_some() {
            return Err(KernelError::TransactionAlreadyOpen);
        }
        let request = StateRequest::begin(store, label)?;
        let id = request.id();
        self.active = Some(request);
        Ok(id)
    }

    /// Close the open request and push it onto the undo stack. A request
    /// that touched nothing is not kept.
    #[instrument(skip_all)]
    pub fn commit(&mut self, store: &mut EntityStore) -> Result<CommitSummary, KernelError> {
        let mut request = self.active.take().ok_or(KernelError::NoOpenTransaction)?;
        request.on_commit(store)?;

        let summary = CommitSummary {
            id: request.id(),
            label: request.label().to_string(),
            created: request.count(EntityTransactionType::Creation),
            modified: request.count(EntityTransactionType::Modification),
            deleted: request.count(EntityTransactionType::Deletion),
        };
        debug!(label = %summary.label, entities = summary.entities(), "commit");

        if self.audit_on_commit {
            let audit = audit_and_report(store);
            if !audit.all_valid() {
                warn!(label = %summary.label, errors = audit.errors.len(), "commit left topology inconsistent");
            }
        }
        if !request.is_empty() {
            self.push_history(Box::new(request));
        }
        Ok(summary)
    }

    /// Drop the open request and roll the store back.
    pub fn abort(&mut self, store: &mut EntityStore) -> Result<(), KernelError> {
        let request = self.active.take().ok_or(KernelError::NoOpenTransaction)?;
        request.abort(store)
    }

    /// Run `f` inside a request: commit if it succeeds, abort if it fails.
    pub fn transact<T>(
        &mut self,
        store: &mut EntityStore,
        label: impl Into<String>,
        f: impl FnOnce(&mut EntityStore) -> Result<T, KernelError>,
    ) -> Result<(T, CommitSummary), KernelError> {
        self.start(store, label)?;
        match f(store) {
            Ok(value) => {
                let summary = self.commit(store)?;
                Ok((value, summary))
            }
            Err(err) => {
                self.abort(store)?;
                Err(err)
            }
        }
    }

    /// Push an externally built request into history.
    pub fn commit_request(&mut self, store: &mut EntityStore, mut request: Box<dyn Request>) -> Result<(), KernelError> {
        if self.active.is_some() {
            return Err(KernelError::TransactionAlreadyOpen);
        }
        request.on_commit(store)?;
        self.push_history(request);
        Ok(())
    }

    fn push_history(&mut self, request: Box<dyn Request>) {
        self.undo.push(request);
        self.redo.clear();
        if self.undo.len() > self.history_limit {
            let excess = self.undo.len() - self.history_limit;
            self.undo.drain(..excess);
        }
    }

    /// Undo the most recent request. Returns its label.
    #[instrument(skip_all)]
    pub fn undo(&mut self, store: &mut EntityStore) -> Result<String, KernelError> {
        if self.active.is_some() {
            return Err(KernelError::RestoreDuringTransaction);
        }
        let mut request = self.undo.pop().ok_or(KernelError::NothingToUndo)?;
        let mut ctx = TxnContext::new(store);
        request.on_undo(&mut ctx)?;
        let label = request.label().to_string();
        debug!(%label, "undo");
        self.redo.push(request);
        Ok(label)
    }

    /// Redo the most recently undone request. Returns its label.
    #[instrument(skip_all)]
    pub fn redo(&mut self, store: &mut EntityStore) -> Result<String, KernelError> {
        if self.active.is_some() {
            return Err(KernelError::RestoreDuringTransaction);
        }
        let mut request = self.redo.pop().ok_or(KernelError::NothingToRedo)?;
        let mut ctx = TxnContext::new(store);
        request.on_redo(&mut ctx)?;
        let label = request.label().to_string();
        debug!(%label, "redo");
        self.undo.push(request);
        Ok(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Forget all history and free the entities only history kept alive.
    pub fn clear(&mut self, store: &mut EntityStore) -> Result<usize, KernelError> {
        if self.active.is_some() {
            return Err(KernelError::TransactionAlreadyOpen);
        }
        self.undo.clear();
        self.redo.clear();
        Ok(store.purge_removed())
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(&KernelConfig::default())
    }
}
