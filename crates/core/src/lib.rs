//! Core types and relational sync logic for masterbook.
//!
//! This crate provides:
//! - SQLite store for characters, aliases, and localized strings
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod lang;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use lang::Lang;
pub use store::characters::CHARACTER_TABLE;
pub use store::{
    AliasRecord, CharacterColumn, CharacterQuery, CharacterRow, ColumnValue, MasterDb, RawCharacterRow, RawStringRow,
    StringChange,
};
pub use store::aliases::AltGroup;
