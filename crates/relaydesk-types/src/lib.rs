//! Shared domain types for Relaydesk.
//!
//! This crate contains the core domain types used across the Relaydesk relay:
//! VisitorIdentity, VisitorSession, TranscriptLine, the wire event vocabulary,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod session;
pub mod transcript;
