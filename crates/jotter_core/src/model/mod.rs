//! Domain model for notes and their list projections.
//!
//! # Responsibility
//! - Define canonical data structures shared by repository and store layers.
//! - Keep one persisted note shape with lighter read-side projections.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Deletion is permanent; there are no tombstones.

pub mod note;
