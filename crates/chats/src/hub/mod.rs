//! Live session registry and per-connection plumbing.

pub mod connection;
pub mod registry;

pub use connection::{
    CloseSignal, Connection, ConnectionHandle, ConnectionInfo, DisconnectReason, Payload, SessionId,
};
pub use registry::{BroadcastReport, ConnectionHub};
