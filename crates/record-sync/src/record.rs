//! Book records and the drafts submitted to create or edit them.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use remote_service_client::Row;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Server-assigned record id.
pub type RecordId = i64;

/// A confirmed row of the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub user_id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(row))
    }

    /// List order: newest `created_at` first, ties by higher `id` first.
    pub fn newest_first(a: &Record, b: &Record) -> Ordering {
        b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
    }

    /// Replace the editable fields with `fields`.
    pub fn apply(&mut self, fields: &RecordDraft) {
        self.title = fields.title.clone();
        self.author = fields.author.clone();
        self.isbn = fields.isbn.clone();
        self.publication_year = fields.publication_year;
    }
}

/// User-editable fields of a record.
///
/// Submitted whole for both create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
}

/// Replacement editable fields for an update.
pub type RecordPatch = RecordDraft;

impl RecordDraft {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    /// Trim text fields and check the required ones.
    ///
    /// A blank ISBN becomes `None`.
    pub fn normalized(&self) -> SyncResult<RecordDraft> {
        let title = self.title.trim();
        let author = self.author.trim();
        if title.is_empty() || author.is_empty() {
            return Err(SyncError::ValidationFailed(
                "Title and Author are required.".to_string(),
            ));
        }

        Ok(RecordDraft {
            title: title.to_string(),
            author: author.to_string(),
            isbn: self
                .isbn
                .as_deref()
                .map(str::trim)
                .filter(|isbn| !isbn.is_empty())
                .map(str::to_string),
            publication_year: self.publication_year,
        })
    }

    /// Row payload owned by `user_id`. Absent optionals are sent as null.
    pub fn to_row(&self, user_id: &str) -> Row {
        let mut row = Row::new();
        row.insert("user_id".to_string(), user_id.into());
        row.insert("title".to_string(), self.title.as_str().into());
        row.insert("author".to_string(), self.author.as_str().into());
        row.insert("isbn".to_string(), self.isbn.clone().into());
        row.insert(
            "publication_year".to_string(),
            self.publication_year.into(),
        );
        row
    }
}
