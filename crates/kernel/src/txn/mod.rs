//! Per-entity transaction states, requests and the undo/redo manager.

pub mod context;
pub mod manager;
pub mod recording;
pub mod request;
pub mod state;
