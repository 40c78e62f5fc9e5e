//! Shared fixtures for the gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sendiz_chats::{ChatEngine, ConnectionHub};
use sendiz_config::{DatabaseConfig, DeliveryConfig};
use sendiz_database::{
    initialize_database, ChatRepository, MemberRepository, MemberRole, SqliteStore,
};
use sendiz_gateway::{create_router, GatewayState, JwtVerifier};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "gateway-test-secret";

pub struct TestApp {
    pub router: Router,
    pub engine: ChatEngine,
    pub pool: SqlitePool,
    pub chat_id: i64,
    verifier: JwtVerifier,
    _dir: TempDir,
}

impl TestApp {
    /// App with one chat whose members are `members`.
    pub async fn new(members: &[i64]) -> Self {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("gateway.db").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await.unwrap();

        let chat = ChatRepository::new(pool.clone()).create("general").await.unwrap();
        let repo = MemberRepository::new(pool.clone());
        for user_id in members {
            repo.add(chat.id, *user_id, MemberRole::Member).await.unwrap();
        }

        let settings = DeliveryConfig {
            max_text_length: 64,
            default_page_size: 2,
            ..DeliveryConfig::default()
        };
        let engine = ChatEngine::new(
            Arc::new(SqliteStore::new(pool.clone())),
            ConnectionHub::new(),
            settings,
        );
        let state = GatewayState::new(
            engine.clone(),
            JwtVerifier::new(SECRET, None),
            vec!["http://localhost:3000".to_string()],
        );

        Self {
            router: create_router(state),
            engine,
            pool,
            chat_id: chat.id,
            verifier: JwtVerifier::new(SECRET, None),
            _dir: dir,
        }
    }

    pub fn token(&self, user_id: i64) -> String {
        self.verifier
            .issue(user_id, Duration::from_secs(300))
            .unwrap()
    }

    /// Send a request as `user_id` (or anonymously) and decode the JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub fn messages_uri(&self) -> String {
        format!("/api/v1/chats/{}/messages", self.chat_id)
    }
}
