//! HTTP layer for Relaydesk.
//!
//! A single WebSocket endpoint carries all relay traffic; `/health` is the
//! only plain HTTP route.

pub mod router;
pub mod ws;
