//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted `Note` record and its write-side inputs.
//! - Define projections (`PartialNote`, `NoteListItem`) returned by reads.
//! - Define the sort vocabulary shared by the list cache.
//!
//! # Invariants
//! - `id` is generated once by the repository and never changes.
//! - `created_at <= updated_at` for every persisted note.
//! - A projection omits fields; it never fills them with placeholders.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of one note.
pub type NoteId = Uuid;

/// Fully materialized note record as stored in the note blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Unix epoch milliseconds, set once at creation.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every successful update.
    pub updated_at: i64,
}

/// Caller input for note creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Caller input for full title/content replacement of one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub id: NoteId,
    pub title: String,
    pub content: String,
}

impl NoteUpdate {
    pub fn new(id: NoteId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Addressable fields of a note, used by sort keys and projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteField {
    Id,
    Title,
    Content,
    CreatedAt,
    UpdatedAt,
}

impl NoteField {
    /// Fields kept by the list projection.
    pub const LIST_ITEM: [NoteField; 4] = [
        NoteField::Id,
        NoteField::Title,
        NoteField::CreatedAt,
        NoteField::UpdatedAt,
    ];

    /// Serialized field name inside the note blob.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Content => "content",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

impl Display for NoteField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Note {
    /// Compares two notes on a single field.
    ///
    /// Strings compare lexicographically, timestamps numerically and ids by
    /// their hyphenated text form.
    pub fn compare_field(&self, other: &Note, field: NoteField) -> Ordering {
        match field {
            NoteField::Id => self.id.to_string().cmp(&other.id.to_string()),
            NoteField::Title => self.title.cmp(&other.title),
            NoteField::Content => self.content.cmp(&other.content),
            NoteField::CreatedAt => self.created_at.cmp(&other.created_at),
            NoteField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
        }
    }

    /// Narrows this note to the requested fields.
    ///
    /// An empty field list keeps every field.
    pub fn project(&self, fields: &[NoteField]) -> PartialNote {
        if fields.is_empty() {
            return PartialNote::from(self.clone());
        }

        let mut projected = PartialNote::default();
        for field in fields {
            match field {
                NoteField::Id => projected.id = Some(self.id),
                NoteField::Title => projected.title = Some(self.title.clone()),
                NoteField::Content => projected.content = Some(self.content.clone()),
                NoteField::CreatedAt => projected.created_at = Some(self.created_at),
                NoteField::UpdatedAt => projected.updated_at = Some(self.updated_at),
            }
        }
        projected
    }
}

/// Field-restricted view of a note returned by repository reads.
///
/// Fields outside the requested projection are `None` and are omitted when
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl PartialNote {
    /// Returns whether `field` is present in this projection.
    pub fn has(&self, field: NoteField) -> bool {
        match field {
            NoteField::Id => self.id.is_some(),
            NoteField::Title => self.title.is_some(),
            NoteField::Content => self.content.is_some(),
            NoteField::CreatedAt => self.created_at.is_some(),
            NoteField::UpdatedAt => self.updated_at.is_some(),
        }
    }

    /// Converts back into a full note when no field was projected away.
    pub fn into_note(self) -> Option<Note> {
        Some(Note {
            id: self.id?,
            title: self.title?,
            content: self.content?,
            created_at: self.created_at?,
            updated_at: self.updated_at?,
        })
    }
}

impl From<Note> for PartialNote {
    fn from(note: Note) -> Self {
        Self {
            id: Some(note.id),
            title: Some(note.title),
            content: Some(note.content),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}

/// Lightweight list entry: a note without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteListItem {
    pub id: NoteId,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteListItem {
    /// Compares two list entries on one sortable field.
    pub fn compare_by(&self, other: &NoteListItem, field: SortField) -> Ordering {
        match field {
            SortField::Title => self.title.cmp(&other.title),
            SortField::CreatedAt => self.created_at.cmp(&other.created_at),
            SortField::UpdatedAt => self.updated_at.cmp(&other.updated_at),
        }
    }
}

impl From<&Note> for NoteListItem {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Error returned when a projection lacks a field required by the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub NoteField);

impl Display for MissingField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "projection is missing required field `{}`", self.0)
    }
}

impl std::error::Error for MissingField {}

impl TryFrom<PartialNote> for NoteListItem {
    type Error = MissingField;

    fn try_from(value: PartialNote) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.ok_or(MissingField(NoteField::Id))?,
            title: value.title.ok_or(MissingField(NoteField::Title))?,
            created_at: value.created_at.ok_or(MissingField(NoteField::CreatedAt))?,
            updated_at: value.updated_at.ok_or(MissingField(NoteField::UpdatedAt))?,
        })
    }
}

/// Field the cached note list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    CreatedAt,
    UpdatedAt,
}

impl From<SortField> for NoteField {
    fn from(value: SortField) -> Self {
        match value {
            SortField::Title => NoteField::Title,
            SortField::CreatedAt => NoteField::CreatedAt,
            SortField::UpdatedAt => NoteField::UpdatedAt,
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "created" | "createdat" | "created_at" => Ok(Self::CreatedAt),
            "updated" | "updatedat" | "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!(
                "unsupported sort field `{other}`; expected title|created|updated"
            )),
        }
    }
}

/// Direction applied to a `SortField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering currently applied to the cached note list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriteria {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortCriteria {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Orders two list entries according to this criteria.
    pub fn compare(&self, a: &NoteListItem, b: &NoteListItem) -> Ordering {
        let ordering = a.compare_by(b, self.field);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl Default for SortCriteria {
    fn default() -> Self {
        Self::new(SortField::Title, SortDirection::Asc)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
