//! # sigil-storage
//!
//! Conversation persistence for the Sigil engine.
//!
//! The engine treats storage as a collaborator behind the [`store::Store`]
//! trait: append-only messages and events per conversation id, ordered
//! loads, and user-scoped search. Storage failures always propagate to the
//! caller — partial telemetry is worse than a visible crash.
//!
//! [`memory::MemoryStore`] is the in-process backend used by tests and
//! embedded callers; database-backed stores implement the same trait
//! outside this workspace.

#![deny(unsafe_code)]

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{SearchOptions, Store, StoreError, StoredEvent};
