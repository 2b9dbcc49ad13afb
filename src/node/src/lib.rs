//! POAMFlow operator CLI
//!
//! Loads `poamflow.toml`, builds the authority model and record backend, and
//! runs one workflow command per invocation against a JSON records file or
//! a PostgreSQL database.

pub mod cli;
pub mod commands;
pub mod config;
pub mod records;

pub use cli::Cli;
pub use config::{NodeConfig, StoreBackend};
pub use records::{RecordBackend, RecordFile};
