//! # user-gateway
//!
//! REST and WebSocket gateway for user management over a publish/subscribe
//! command bus.
//!
//! Clients talk HTTP or WebSocket to the gateway. The gateway turns every
//! operation into a request on a broker channel, the user command server
//! answers from its store and publishes a domain event after each
//! successful mutation, and the connection hub fans those events out to
//! every connected WebSocket client.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/) ──────────── Hub (hub/) ◄── event forwarder
//!     │                                                     ▲
//!     ├── UserClient (client/)                              │
//!     │        │ request/reply                              │ user.event.*
//!     ├── Broker (broker/) ─────────────────────────────────┘
//!     │        │ user.command.*
//!     ├── CommandServer (service/)
//!     │
//!     └── UserStore (store/): in-memory or PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod broker;
pub mod client;
pub mod config;
pub mod contract;
pub mod domain;
pub mod error;
pub mod hub;
pub mod service;
pub mod store;
pub mod validation;
pub mod ws;
