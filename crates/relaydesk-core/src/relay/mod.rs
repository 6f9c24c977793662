//! The relay layer: per-connection handles, the operator fan-out hub, and
//! the controller that owns all live state.

pub mod connection;
pub mod hub;
pub mod service;

pub use connection::ConnectionHandle;
pub use hub::OperatorHub;
pub use service::RelayService;
