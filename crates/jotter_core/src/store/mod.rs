//! Client-side state layer.
//!
//! # Responsibility
//! - Keep an in-memory view (list cache, open note, sort) consistent with
//!   the repository.
//! - Convert repository faults into typed failure results.
//! - Model the editor's autosave protocol on top of the store.

pub mod editor;
pub mod notes_store;
