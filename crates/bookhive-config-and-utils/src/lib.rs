//! Core types, configuration, and utilities shared by the BookHive crates.

mod config;
mod error;
mod error_kind;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_LOG_LEVEL, DEFAULT_RECORDS_TABLE, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use error_kind::ErrorKind;
pub use logging::{init_logging, init_logging_for_service, parse_level};
pub use paths::Paths;
