//! BookHive CLI - sign in and manage your personal book catalog.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::BookFields;
use record_sync::RecordId;
use tracing::debug;

/// BookHive CLI - Keep track of the books you own.
#[derive(Parser)]
#[command(name = "bookhive")]
#[command(about = "BookHive CLI for authentication and book management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Create an account
    Signup,

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// List my books, newest first
    List,

    /// Add a book
    Add {
        /// Book title
        #[arg(short, long)]
        title: String,
        /// Author
        #[arg(short, long)]
        author: String,
        /// ISBN
        #[arg(long)]
        isbn: Option<String>,
        /// Publication year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Edit a book; omitted fields are unchanged
    Edit {
        /// Book ID
        id: RecordId,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New author
        #[arg(short, long)]
        author: Option<String>,
        /// New ISBN (empty to clear)
        #[arg(long)]
        isbn: Option<String>,
        /// New publication year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Delete a book
    Delete {
        /// Book ID
        id: RecordId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    bookhive_config_and_utils::init_logging_for_service("cli", &cli.log_level);
    debug!(format = ?cli.format, "Starting");

    let result = match cli.command {
        Commands::Login => commands::login(&cli.format).await,
        Commands::Signup => commands::signup(&cli.format).await,
        Commands::Logout => commands::logout(&cli.format).await,
        Commands::Status => commands::status(&cli.format).await,
        Commands::List => commands::books_list(&cli.format).await,
        Commands::Add {
            title,
            author,
            isbn,
            year,
        } => {
            let fields = BookFields {
                title: Some(title),
                author: Some(author),
                isbn,
                year,
            };
            commands::books_add(fields, &cli.format).await
        }
        Commands::Edit {
            id,
            title,
            author,
            isbn,
            year,
        } => {
            let fields = BookFields {
                title,
                author,
                isbn,
                year,
            };
            commands::books_edit(id, fields, &cli.format).await
        }
        Commands::Delete { id, yes } => commands::books_delete(id, yes, &cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&e.to_string(), &cli.format);
        std::process::exit(1);
    }
}
