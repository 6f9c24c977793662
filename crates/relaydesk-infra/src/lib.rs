//! Infrastructure layer for Relaydesk.
//!
//! Contains implementations of the storage ports defined in `relaydesk-core`:
//! SQLite session persistence and filesystem transcript archival, plus the
//! configuration loader.

pub mod archive;
pub mod config;
pub mod sqlite;
