//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::client::UserClient;
use crate::hub::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Client for the user command bus.
    pub users: UserClient,
    /// Registry of live WebSocket connections.
    pub hub: Arc<Hub>,
}
