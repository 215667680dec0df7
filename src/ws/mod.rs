//! WebSocket layer: connection handling and action dispatch.
//!
//! The endpoint at `/ws` accepts `{ requestId, action, payload }` frames.
//! Failures and non-mutating actions get a direct reply; successful
//! mutations are confirmed only by the domain event the hub broadcasts to
//! every connection.

pub mod actions;
pub mod connection;
pub mod handler;
pub mod messages;
