//! Output formatting for the CLI.

use clap::ValueEnum;
use record_sync::Record;
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not encode output: {}", e),
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({"status": "success", "message": message})
            );
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::json!({"status": "error", "message": message})
            );
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}

/// Print one book as a detail block.
pub fn print_record(record: &Record) {
    println!("[{}] {}", record.id, record.title);
    print_row("Author", &record.author);
    if let Some(isbn) = &record.isbn {
        print_row("ISBN", isbn);
    }
    if let Some(year) = record.publication_year {
        print_row("Year", &year.to_string());
    }
    print_row("Added", &record.created_at.to_rfc3339());
}

/// Print books in the requested format.
pub fn print_records(records: &[Record], format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            print_heading(&format!("My Books ({})", records.len()));
            if records.is_empty() {
                println!("No books yet. Add one with 'bookhive add'.");
            }
            for record in records {
                print_record(record);
            }
        }
    }
}
