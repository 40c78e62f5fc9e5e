//! Shared fixtures for the chats integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sendiz_chats::{
    ChatEngine, ConnectionHub, FrameSink, FrameSource, InboundFrame, Payload, ServerEvent,
    TransportError,
};
use sendiz_config::{DatabaseConfig, DeliveryConfig};
use sendiz_database::{
    initialize_database, Attachment, ChatRepository, ChatStore, DatabaseError, DatabaseResult,
    MemberRepository, MemberRole, Message, NewMessage, SqliteStore,
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct TestDb {
    pub pool: SqlitePool,
    pub chat_id: i64,
    _dir: TempDir,
}

/// Migrated database holding one chat whose members are `members`.
pub async fn test_db(members: &[i64]) -> TestDb {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite:{}", dir.path().join("chats.db").display()),
        max_connections: 4,
    };
    let pool = initialize_database(&config).await.unwrap();

    let chat = ChatRepository::new(pool.clone()).create("c1").await.unwrap();
    let repo = MemberRepository::new(pool.clone());
    for user_id in members {
        repo.add(chat.id, *user_id, MemberRole::Member).await.unwrap();
    }

    TestDb {
        pool,
        chat_id: chat.id,
        _dir: dir,
    }
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

pub fn settings() -> DeliveryConfig {
    DeliveryConfig {
        outbound_queue_capacity: 8,
        hydration_concurrency: 2,
        hydration_timeout_ms: 500,
        write_timeout_ms: 500,
        idle_timeout_secs: 30,
        max_text_length: 64,
        max_attachments: 3,
        default_page_size: 10,
        max_page_size: 20,
    }
}

pub fn engine_for(db: &TestDb, hub: ConnectionHub) -> ChatEngine {
    ChatEngine::new(Arc::new(SqliteStore::new(db.pool.clone())), hub, settings())
}

/// Store wrapper that can slow down or fail hydration lookups and inserts.
pub struct FlakyStore {
    inner: SqliteStore,
    pub lookup_delay: Mutex<Option<Duration>>,
    pub failing_lookups: Mutex<HashSet<i64>>,
    pub fail_inserts: Mutex<Option<DatabaseError>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub lookups: AtomicUsize,
}

impl FlakyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqliteStore::new(pool),
            lookup_delay: Mutex::new(None),
            failing_lookups: Mutex::new(HashSet::new()),
            fail_inserts: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatStore for FlakyStore {
    async fn insert_message(&self, new: &NewMessage) -> DatabaseResult<Message> {
        if let Some(err) = self.fail_inserts.lock().unwrap().take() {
            return Err(err);
        }
        self.inner.insert_message(new).await
    }

    async fn find_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>> {
        self.inner.find_message(chat_id, message_id).await
    }

    async fn list_message_ids(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: u32,
    ) -> DatabaseResult<Vec<i64>> {
        self.inner.list_message_ids(chat_id, before, limit).await
    }

    async fn attachments_for(&self, message_id: i64) -> DatabaseResult<Vec<Attachment>> {
        self.inner.attachments_for(message_id).await
    }

    async fn find_hydrated(&self, chat_id: i64, message_id: i64) -> DatabaseResult<Option<Message>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self.failing_lookups.lock().unwrap().contains(&message_id);
        let result = if fail {
            Err(DatabaseError::Unavailable("injected failure".into()))
        } else {
            self.inner.find_hydrated(chat_id, message_id).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn update_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DatabaseResult<Option<Message>> {
        self.inner.update_message_text(chat_id, message_id, text).await
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> DatabaseResult<bool> {
        self.inner.delete_message(chat_id, message_id).await
    }

    async fn is_member(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        self.inner.is_member(chat_id, user_id).await
    }
}

/// In-memory transport: the test pushes inbound frames and reads what the
/// session wrote.
pub struct ChannelSource {
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }
}

pub struct ChannelSink {
    outbound: mpsc::UnboundedSender<String>,
    /// When set, writes never complete.
    stalled: bool,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_text(&mut self, payload: Payload) -> Result<(), TransportError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(payload.to_string())
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct TestClient {
    pub to_server: mpsc::UnboundedSender<InboundFrame>,
    pub from_server: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    pub fn send_json(&self, value: serde_json::Value) {
        self.to_server
            .send(InboundFrame::Text(value.to_string()))
            .unwrap();
    }

    /// Next event written by the session, failing the test after a second.
    pub async fn next_event(&mut self) -> ServerEvent {
        let raw = tokio::time::timeout(Duration::from_secs(1), self.from_server.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("session closed");
        serde_json::from_str(&raw).unwrap()
    }

    /// Assert nothing else arrives within a short window.
    pub async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.from_server.recv()).await;
        assert!(next.is_err(), "unexpected event: {next:?}");
    }
}

pub fn transport(stalled: bool) -> (ChannelSource, ChannelSink, TestClient) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();
    (
        ChannelSource { inbound },
        ChannelSink { outbound, stalled },
        TestClient {
            to_server,
            from_server,
        },
    )
}
