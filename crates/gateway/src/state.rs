//! Shared application state for the gateway

use std::sync::Arc;

use sendiz_chats::ChatEngine;
use sendiz_config::AppConfig;

use crate::auth::JwtVerifier;
use crate::error::{GatewayError, GatewayResult};

#[derive(Clone)]
pub struct GatewayState {
    pub engine: ChatEngine,
    pub verifier: Arc<JwtVerifier>,
    pub allowed_origins: Vec<String>,
}

impl GatewayState {
    pub fn new(engine: ChatEngine, verifier: JwtVerifier, allowed_origins: Vec<String>) -> Self {
        Self {
            engine,
            verifier: Arc::new(verifier),
            allowed_origins,
        }
    }

    /// Build the state from loaded configuration. A JWT secret is required.
    pub fn from_config(engine: ChatEngine, config: &AppConfig) -> GatewayResult<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                GatewayError::InternalError("auth.jwt_secret must be configured".to_string())
            })?;

        Ok(Self::new(
            engine,
            JwtVerifier::new(secret, config.auth.issuer.clone()),
            config.http.allowed_origins.clone(),
        ))
    }
}
