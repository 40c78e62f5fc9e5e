//! # Sendiz Gateway Crate
//!
//! HTTP and WebSocket surface for the chat delivery engine.
//!
//! ## Architecture
//!
//! - **REST**: message submit, history, edit and delete under `/api/v1`
//! - **WebSocket**: live sessions at `/api/v1/chats/:chat_id/ws`
//! - **State**: the shared `ChatEngine` plus the token verifier
//! - **Middleware**: bearer authentication, CORS and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sendiz_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::from_config(engine, &config)?;
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use auth::JwtVerifier;
pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, UserId};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let cors = middleware::create_cors_layer(&state.allowed_origins);
    let arc_state = Arc::new(state);

    let api = Router::new()
        .merge(rest::create_rest_routes())
        .merge(websocket::create_websocket_routes())
        .route_layer(axum_middleware::from_fn_with_state(
            arc_state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(arc_state);

    Router::new()
        .route("/ping", get(rest::health::ping))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
