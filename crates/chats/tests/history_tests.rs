mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{settings, test_db, FlakyStore};
use sendiz_chats::{ChatError, HistoryReader, MessageDraft, PageCursor, PersistenceGateway};
use sendiz_database::{AttachmentKind, ChatStore, NewAttachment, SqliteStore};

async fn seed(db: &common::TestDb, count: usize) -> Vec<i64> {
    let gateway = PersistenceGateway::new(Arc::new(SqliteStore::new(db.pool.clone())), &settings());
    let mut ids = Vec::new();
    for i in 0..count {
        let draft = MessageDraft {
            text: format!("message {i}"),
            reply_to: None,
            attachments: vec![NewAttachment::new(
                AttachmentKind::Image,
                format!("https://cdn/{i}.png"),
            )],
        };
        ids.push(gateway.save_message(db.chat_id, 1, draft).await.unwrap().id);
    }
    ids
}

#[tokio::test]
async fn pages_are_newest_first_and_follow_the_cursor() {
    let db = test_db(&[1]).await;
    let ids = seed(&db, 5).await;
    let reader = HistoryReader::new(Arc::new(SqliteStore::new(db.pool.clone())), &settings());

    let first = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 3)
        .await
        .unwrap();
    let cursor = first.next_cursor.expect("full page should carry a cursor");
    let first_ids: Vec<i64> = first.into_iter().map(|m| m.id).collect();
    assert_eq!(first_ids, vec![ids[4], ids[3], ids[2]]);

    let second = reader.get_messages(db.chat_id, cursor, 3).await.unwrap();
    assert!(second.next_cursor.is_none());
    let second: Vec<_> = second.into_iter().collect();
    assert_eq!(second.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);
    assert!(second.iter().all(|m| m.attachments.len() == 1));
    assert!(second[0].created_at >= second[1].created_at);
}

#[tokio::test]
async fn zero_limit_uses_default_and_large_limits_are_clamped() {
    let db = test_db(&[1]).await;
    seed(&db, 25).await;
    let reader = HistoryReader::new(Arc::new(SqliteStore::new(db.pool.clone())), &settings());

    let page = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), settings().default_page_size as usize);

    let page = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 1_000)
        .await
        .unwrap();
    assert_eq!(page.len(), settings().max_page_size as usize);
}

#[tokio::test]
async fn empty_chat_returns_empty_page() {
    let db = test_db(&[1]).await;
    let reader = HistoryReader::new(Arc::new(SqliteStore::new(db.pool.clone())), &settings());

    let page = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 10)
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn hydration_never_exceeds_the_concurrency_bound() {
    let db = test_db(&[1]).await;
    seed(&db, 8).await;
    let store = Arc::new(FlakyStore::new(db.pool.clone()));
    *store.lookup_delay.lock().unwrap() = Some(Duration::from_millis(20));
    let reader = HistoryReader::new(store.clone(), &settings());

    let page = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 8)
        .await
        .unwrap();
    assert_eq!(page.len(), 8);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 8);

    let peak = store.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= settings().hydration_concurrency, "peak {peak}");
    assert!(peak >= 1);
}

#[tokio::test]
async fn one_failed_lookup_fails_the_whole_page() {
    let db = test_db(&[1]).await;
    let ids = seed(&db, 4).await;
    let store = Arc::new(FlakyStore::new(db.pool.clone()));
    store.failing_lookups.lock().unwrap().insert(ids[2]);
    let reader = HistoryReader::new(store, &settings());

    let err = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 10)
        .await
        .unwrap_err();
    match err {
        ChatError::HydrationFailed { message_id, .. } => assert_eq!(message_id, ids[2]),
        other => panic!("expected hydration failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_lookup_times_out() {
    let db = test_db(&[1]).await;
    seed(&db, 2).await;
    let store = Arc::new(FlakyStore::new(db.pool.clone()));
    *store.lookup_delay.lock().unwrap() = Some(Duration::from_secs(2));
    let reader = HistoryReader::new(store, &settings());

    let err = reader
        .get_messages(db.chat_id, PageCursor::NEWEST, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::HydrationFailed { .. }));
}

async fn save_with_attachments(store: &Arc<SqliteStore>, db: &common::TestDb, links: &[&str]) -> i64 {
    let gateway = PersistenceGateway::new(store.clone(), &settings());
    let draft = MessageDraft {
        text: "album".into(),
        reply_to: None,
        attachments: links
            .iter()
            .map(|link| NewAttachment::new(AttachmentKind::Image, *link))
            .collect(),
    };
    gateway.save_message(db.chat_id, 1, draft).await.unwrap().id
}

#[tokio::test]
async fn message_deleted_during_hydration_is_left_out_whole() {
    let db = test_db(&[1]).await;
    let sqlite = Arc::new(SqliteStore::new(db.pool.clone()));
    let kept = save_with_attachments(&sqlite, &db, &["https://cdn/k.png"]).await;
    let doomed =
        save_with_attachments(&sqlite, &db, &["https://cdn/a.png", "https://cdn/b.png"]).await;

    let store = Arc::new(FlakyStore::new(db.pool.clone()));
    *store.lookup_delay.lock().unwrap() = Some(Duration::from_millis(150));
    let reader = HistoryReader::new(store, &settings());
    let chat_id = db.chat_id;

    let read = tokio::spawn(async move { reader.get_messages(chat_id, PageCursor::NEWEST, 10).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sqlite.delete_message(chat_id, doomed).await.unwrap());

    let page = read.await.unwrap().unwrap();
    assert!(page.next_cursor.is_none());
    let messages: Vec<_> = page.into_iter().collect();
    assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![kept]);
    assert_eq!(messages[0].attachments.len(), 1);
}

#[tokio::test]
async fn full_page_keeps_its_cursor_when_a_message_disappears() {
    let db = test_db(&[1]).await;
    let ids = seed(&db, 3).await;
    let sqlite = SqliteStore::new(db.pool.clone());

    let store = Arc::new(FlakyStore::new(db.pool.clone()));
    *store.lookup_delay.lock().unwrap() = Some(Duration::from_millis(150));
    let reader = HistoryReader::new(store, &settings());
    let chat_id = db.chat_id;

    let read = tokio::spawn(async move { reader.get_messages(chat_id, PageCursor::NEWEST, 2).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sqlite.delete_message(chat_id, ids[2]).await.unwrap());

    let page = read.await.unwrap().unwrap();
    assert_eq!(page.next_cursor, Some(PageCursor(ids[1])));
    let messages: Vec<_> = page.into_iter().collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, ids[1]);
    assert_eq!(messages[0].attachments.len(), 1);
}
