//! SQLite-backed relational store for synced master data.
//!
//! This module owns the derived tables that the sync pipeline maintains:
//!
//! - Characters, upserted from `CharacterMB` with insert-vs-update reporting
//! - Alt-groups and aliases seeded for newly inserted characters
//! - Localized strings with a per-version change audit log
//! - The catalog hash each master table was last synced at
//!
//! Access is async via tokio-rusqlite; every multi-statement write runs in a
//! single transaction so a failed batch leaves no partial state behind.

pub mod aliases;
pub mod characters;
pub mod connection;
pub mod migrations;
pub mod strings;
pub mod sync_state;

pub use crate::Error;

pub use aliases::{AliasRecord, normalize_alias};
pub use characters::{CharacterColumn, CharacterQuery, CharacterRow, ColumnValue, RawCharacterRow};
pub use connection::MasterDb;
pub use strings::{RawStringRow, StringChange};
