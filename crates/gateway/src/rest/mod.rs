//! REST API endpoints for the gateway

pub mod health;
pub mod message;

use std::sync::Arc;

use axum::Router;

use crate::state::GatewayState;

/// Routes that require an authenticated caller.
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new().merge(message::create_message_routes())
}
