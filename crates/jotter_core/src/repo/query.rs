//! In-memory query evaluation over the full note set.
//!
//! # Responsibility
//! - Express field-equality filters, multi-key sorts, pagination and
//!   projections as typed values.
//! - Evaluate them over a loaded record set.
//!
//! # Invariants
//! - Evaluation order is filter -> sort -> skip -> limit -> projection.
//! - Sorting is stable: rows equal on every sort key keep storage order.
//! - Sort keys form a tie-break chain in insertion order.

use crate::model::note::{Note, NoteField, NoteId, PartialNote};
use std::cmp::Ordering;

/// Field-equality filter; a note matches when every set field is equal.
///
/// The default (all fields unset) matches every note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    pub id: Option<NoteId>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl NoteQuery {
    /// Filter matching every note.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching the note with `id`.
    pub fn by_id(id: NoteId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Returns whether no field constraint is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Strict field equality on every constrained field.
    pub fn matches(&self, note: &Note) -> bool {
        self.id.map_or(true, |id| note.id == id)
            && self.title.as_ref().map_or(true, |title| &note.title == title)
            && self
                .content
                .as_ref()
                .map_or(true, |content| &note.content == content)
            && self.created_at.map_or(true, |at| note.created_at == at)
            && self.updated_at.map_or(true, |at| note.updated_at == at)
    }
}

/// Direction of one sort key, encoded as `1` / `-1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parses the numeric `1` / `-1` encoding.
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::Ascending),
            -1 => Some(Self::Descending),
            _ => None,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Read options: pagination, sort chain and projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Rows dropped from the front of the sorted result.
    pub skip: Option<usize>,
    /// Maximum rows returned after `skip`.
    pub limit: Option<usize>,
    /// Ordered sort keys; the first is primary, later keys break ties.
    pub sort_by: Vec<(NoteField, SortOrder)>,
    /// Fields kept in each returned row; empty keeps every field.
    pub projection: Vec<NoteField>,
}

impl QueryOptions {
    /// Appends a sort key.
    ///
    /// Re-adding a field keeps its original position in the chain and only
    /// replaces its order, mirroring how a key-ordered mapping behaves.
    pub fn sort_by(mut self, field: NoteField, order: SortOrder) -> Self {
        match self.sort_by.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = order,
            None => self.sort_by.push((field, order)),
        }
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project(mut self, fields: &[NoteField]) -> Self {
        self.projection = fields.to_vec();
        self
    }

    fn compare(&self, a: &Note, b: &Note) -> Ordering {
        for (field, order) in &self.sort_by {
            let ordering = order.apply(a.compare_field(b, *field));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Evaluates `query` and `options` over a loaded record set.
pub fn execute(notes: Vec<Note>, query: &NoteQuery, options: &QueryOptions) -> Vec<PartialNote> {
    let mut matched: Vec<Note> = if query.is_empty() {
        notes
    } else {
        notes.into_iter().filter(|note| query.matches(note)).collect()
    };

    if !options.sort_by.is_empty() {
        matched.sort_by(|a, b| options.compare(a, b));
    }

    matched
        .iter()
        .skip(options.skip.unwrap_or(0))
        .take(options.limit.unwrap_or(usize::MAX))
        .map(|note| note.project(&options.projection))
        .collect()
}
