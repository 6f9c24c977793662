//! Business logic and storage trait definitions for Relaydesk.
//!
//! This crate defines the ports the infrastructure layer implements
//! (`SessionStore`, `ArchiveSink`) plus the relay controller that routes
//! chat traffic between visitor and operator connections. It depends only
//! on `relaydesk-types`, never on a database or transport crate.

pub mod archive;
pub mod relay;
pub mod store;
