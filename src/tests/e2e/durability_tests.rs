use crate::modules::event_streams::core::errors::AppendError;
use crate::modules::event_streams::use_cases::create_stream_and_append::command::CreateStreamAndAppend;
use crate::shared::core::primitives::EventTemplate;
use crate::shared::infrastructure::change_notifier::broadcast::BroadcastHub;
use crate::shared::infrastructure::durable_store::StoreError;
use crate::shared::infrastructure::durable_store::lazy::LazyStore;
use crate::shared::infrastructure::durable_store::redb_store::{RedbDurableStore, RedbStoreConfig};
use crate::shell::session::{HostCommand, HostMessage, PersistenceResult, spawn_session};
use crate::tests::fixtures::envelopes::EventEnvelopeBuilder;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::timeout;

fn redb_at(path: &Path) -> LazyStore<RedbDurableStore> {
    let config = RedbStoreConfig {
        db_path: path.to_path_buf(),
        cache_size: 1024 * 1024,
    };
    LazyStore::new(move || RedbDurableStore::open(config.clone()))
}

/// Runs `commands` in one fresh session and returns every reply once the session has drained.
async fn run_session(store: LazyStore<RedbDurableStore>, commands: Vec<HostCommand>) -> Vec<HostMessage> {
    let hub = BroadcastHub::new(8);
    let (host, mut inbox) = unbounded_channel();
    let session = spawn_session(store, hub.join(), host);
    for command in commands {
        session.send(command).unwrap();
    }
    timeout(Duration::from_secs(10), session.shutdown())
        .await
        .expect("session did not drain");

    let mut replies = Vec::new();
    while let Some(message) = inbox.recv().await {
        replies.push(message);
    }
    replies
}

fn create_order(payload: serde_json::Value) -> HostCommand {
    HostCommand::CreateStreamAndAppend(CreateStreamAndAppend::new(
        "order",
        EventTemplate::new("OrderPlaced", payload),
    ))
}

#[tokio::test]
async fn history_and_counters_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("streams.redb");

    let first_run = run_session(
        redb_at(&path),
        vec![
            create_order(json!({ "total": 10 })),
            HostCommand::AppendToStream {
                envelope: EventEnvelopeBuilder::new()
                    .event_id("ev-paid")
                    .event_type("OrderPaid")
                    .stream_position(2)
                    .build(),
            },
        ],
    )
    .await;
    assert_eq!(first_run.len(), 2);
    assert!(first_run.iter().all(|message| matches!(
        message,
        HostMessage::PersistenceResult(PersistenceResult(Ok(_)))
    )));

    let second_run = run_session(
        redb_at(&path),
        vec![
            HostCommand::HydrateStream {
                stream_id: "order-1".into(),
            },
            create_order(json!({ "total": 20 })),
        ],
    )
    .await;

    match &second_run[..] {
        [
            HostMessage::StreamHydrated { events, .. },
            HostMessage::PersistenceResult(PersistenceResult(Ok(created))),
        ] => {
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].payload, json!({ "total": 10 }));
            assert_eq!(events[1].event_id, "ev-paid");
            assert_eq!(created.stream_id, "order-2");
        }
        other => panic!("unexpected replies: {other:?}"),
    }
}

#[tokio::test]
async fn a_store_that_cannot_open_rejects_writes_without_hanging() {
    let store: LazyStore<RedbDurableStore> =
        LazyStore::new(|| Err(StoreError::Backend("storage quota exceeded".into())));

    let replies = run_session(
        store,
        vec![
            create_order(json!({})),
            HostCommand::HydrateStream {
                stream_id: "order-1".into(),
            },
        ],
    )
    .await;

    assert_eq!(
        replies,
        vec![HostMessage::PersistenceResult(PersistenceResult(Err(
            AppendError::StoreUnavailable("backend error: storage quota exceeded".into())
        )))]
    );
}
