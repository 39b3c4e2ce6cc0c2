//! Book catalog commands.

use super::{connect, mount_books, report};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use bookhive_config_and_utils::ErrorKind;
use record_sync::{RecordDraft, RecordId, RecordSync, RefreshOutcome, SyncError};
use std::io::{self, Write};

/// Editable fields given on the command line.
#[derive(Debug, Default)]
pub struct BookFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub year: Option<i32>,
}

fn sync_error(e: SyncError) -> anyhow::Error {
    report(e.kind(), e)
}

/// Fetch the list, failing if the fetch was rejected or the session ended.
async fn load(sync: &RecordSync) -> Result<()> {
    let outcome = sync.refresh().await.map_err(sync_error)?;
    if outcome == RefreshOutcome::Superseded || sync.owner_id().is_none() {
        return Err(report(ErrorKind::SessionExpired, "Run 'bookhive login'"));
    }
    Ok(())
}

/// Ask user for confirmation.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// List my books, newest first.
pub async fn books_list(format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let sync = mount_books(&ctx)?;
    load(&sync).await?;

    output::print_records(&sync.records(), format);
    Ok(())
}

/// Add a book.
pub async fn books_add(fields: BookFields, format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let sync = mount_books(&ctx)?;

    let draft = RecordDraft {
        title: fields.title.unwrap_or_default(),
        author: fields.author.unwrap_or_default(),
        isbn: fields.isbn,
        publication_year: fields.year,
    };
    let record = sync.create(&draft).await.map_err(sync_error)?;

    match format {
        OutputFormat::Json => output::print_json(&record),
        OutputFormat::Text => {
            println!("Book added.");
            output::print_record(&record);
        }
    }
    Ok(())
}

/// Edit a book. Fields not given keep their current value.
pub async fn books_edit(id: RecordId, fields: BookFields, format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let sync = mount_books(&ctx)?;
    load(&sync).await?;

    let existing = sync
        .records()
        .into_iter()
        .find(|record| record.id == id)
        .ok_or_else(|| anyhow::anyhow!("Book {} not found", id))?;

    let patch = RecordDraft {
        title: fields.title.unwrap_or(existing.title),
        author: fields.author.unwrap_or(existing.author),
        isbn: fields.isbn.or(existing.isbn),
        publication_year: fields.year.or(existing.publication_year),
    };
    let updated = sync.update(id, &patch).await.map_err(sync_error)?;

    match (updated, format) {
        (Some(record), OutputFormat::Json) => output::print_json(&record),
        (Some(record), OutputFormat::Text) => {
            println!("Book updated.");
            output::print_record(&record);
        }
        (None, _) => output::print_success(&format!("Book {} updated", id), format),
    }
    Ok(())
}

/// Delete a book.
pub async fn books_delete(id: RecordId, yes: bool, format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let sync = mount_books(&ctx)?;

    if !yes && !confirm(&format!("Delete book {}?", id)) {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    sync.delete(id).await.map_err(sync_error)?;
    output::print_success(&format!("Book {} deleted", id), format);
    Ok(())
}

