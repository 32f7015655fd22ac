//! Repository layer: the note data-access contract and its implementation.
//!
//! # Responsibility
//! - Define the create/read/update/delete contract used by the store.
//! - Isolate blob encoding and query evaluation from state orchestration.
//!
//! # Invariants
//! - The repository is the single source of truth for notes.
//! - Zero-row updates and deletes are reported as counts, not errors.

pub mod note_repo;
pub mod query;
