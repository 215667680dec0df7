//! Service layer: the user command server.
//!
//! [`CommandServer`] decodes commands arriving on the broker, validates
//! them, executes them against a [`crate::store::UserStore`] and publishes
//! the resulting domain events.

pub mod command_server;

pub use command_server::{CommandServer, ServerHandle};
