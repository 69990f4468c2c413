use crate::modules::event_streams::core::errors::AppendError;
use crate::modules::event_streams::use_cases::create_stream_and_append::command::CreateStreamAndAppend;
use crate::shared::core::primitives::EventTemplate;
use crate::shared::infrastructure::change_notifier::broadcast::BroadcastHub;
use crate::shared::infrastructure::durable_store::DurableStore;
use crate::shared::infrastructure::durable_store::in_memory::InMemoryDurableStore;
use crate::shared::infrastructure::durable_store::lazy::LazyStore;
use crate::shell::session::{HostCommand, HostMessage, PersistenceResult, SessionHandle, spawn_session};
use crate::tests::fixtures::envelopes::EventEnvelopeBuilder;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::timeout;

struct Tab {
    session: SessionHandle,
    inbox: UnboundedReceiver<HostMessage>,
}

impl Tab {
    fn open(store: &LazyStore<InMemoryDurableStore>, hub: &BroadcastHub) -> Self {
        let (host, inbox) = unbounded_channel();
        Self {
            session: spawn_session(store.clone(), hub.join(), host),
            inbox,
        }
    }

    fn send(&self, command: HostCommand) {
        self.session.send(command).unwrap();
    }

    async fn next(&mut self) -> HostMessage {
        timeout(Duration::from_secs(5), self.inbox.recv())
            .await
            .expect("timed out waiting for a host message")
            .expect("session closed the host channel")
    }

    async fn assert_quiet(&mut self) {
        let pending = timeout(Duration::from_millis(100), self.inbox.recv()).await;
        assert!(pending.is_err(), "unexpected message: {pending:?}");
    }
}

fn append(event_id: &str, position: u64) -> HostCommand {
    HostCommand::AppendToStream {
        envelope: EventEnvelopeBuilder::new()
            .event_id(event_id)
            .stream_position(position)
            .build(),
    }
}

#[tokio::test]
async fn appends_conflicts_and_fan_out_across_two_tabs() {
    let store = LazyStore::from_open(Arc::new(InMemoryDurableStore::new()));
    let hub = BroadcastHub::new(64);
    let mut tab_a = Tab::open(&store, &hub);
    let mut tab_b = Tab::open(&store, &hub);

    tab_a.send(append("ev-1", 1));
    match tab_a.next().await {
        HostMessage::PersistenceResult(PersistenceResult(Ok(stored))) => {
            assert_eq!(stored.stream_id, "order-1");
            assert_eq!(stored.stream_position, 1);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(
        tab_b.next().await,
        HostMessage::RemoteStreamChanged {
            stream_id: "order-1".into()
        }
    );
    tab_a.assert_quiet().await;
    tab_b.assert_quiet().await;

    tab_a.send(append("ev-1b", 1));
    assert_eq!(
        tab_a.next().await,
        HostMessage::PersistenceResult(PersistenceResult(Err(AppendError::Concurrency {
            stream_id: "order-1".into(),
            declared: 1,
            current: 1,
        })))
    );
    tab_b.assert_quiet().await;

    tab_a.send(append("ev-2", 2));
    assert!(matches!(
        tab_a.next().await,
        HostMessage::PersistenceResult(PersistenceResult(Ok(_)))
    ));
    tab_b.next().await;

    tab_b.send(HostCommand::HydrateStream {
        stream_id: "order-1".into(),
    });
    match tab_b.next().await {
        HostMessage::StreamHydrated { stream_id, events } => {
            assert_eq!(stream_id, "order-1");
            let positions: Vec<u64> = events.iter().map(|e| e.stream_position).collect();
            let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
            assert_eq!(positions, vec![1, 2]);
            assert_eq!(ids, vec!["ev-1", "ev-2"]);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    tab_a.session.shutdown().await;
    tab_b.session.shutdown().await;
}

#[tokio::test]
async fn creating_a_stream_notifies_the_other_tab_once() {
    let store = LazyStore::from_open(Arc::new(InMemoryDurableStore::new()));
    let hub = BroadcastHub::new(64);
    let mut tab_a = Tab::open(&store, &hub);
    let mut tab_b = Tab::open(&store, &hub);

    tab_a.send(HostCommand::CreateStreamAndAppend(CreateStreamAndAppend::new(
        "order",
        EventTemplate::new("OrderPlaced", json!({ "total": 10 })),
    )));

    match tab_a.next().await {
        HostMessage::PersistenceResult(PersistenceResult(Ok(created))) => {
            assert_eq!(created.stream_id, "order-1");
            assert_eq!(created.stream_position, 1);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(
        tab_b.next().await,
        HostMessage::RemoteStreamChanged {
            stream_id: "order-1".into()
        }
    );
    tab_a.assert_quiet().await;
    tab_b.assert_quiet().await;

    tab_a.session.shutdown().await;
    tab_b.session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_from_two_tabs_mint_distinct_streams() {
    let memory = Arc::new(InMemoryDurableStore::new());
    memory.set_delay_commit_ms(2);
    let store = LazyStore::from_open(memory.clone());
    let hub = BroadcastHub::new(64);
    let mut tabs = [Tab::open(&store, &hub), Tab::open(&store, &hub)];

    for tab in &tabs {
        for _ in 0..4 {
            tab.send(HostCommand::CreateStreamAndAppend(CreateStreamAndAppend::new(
                "order",
                EventTemplate::new("OrderPlaced", json!({})),
            )));
        }
    }

    let mut stream_ids = Vec::new();
    for tab in &mut tabs {
        let mut answered = 0;
        while answered < 4 {
            match tab.next().await {
                HostMessage::PersistenceResult(PersistenceResult(Ok(stored))) => {
                    assert_eq!(stored.stream_position, 1);
                    stream_ids.push(stored.stream_id);
                    answered += 1;
                }
                HostMessage::RemoteStreamChanged { .. } => {}
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    stream_ids.sort();
    stream_ids.dedup();
    assert_eq!(stream_ids.len(), 8);
    assert_eq!(memory.load_counter("order").await.unwrap().unwrap().count, 8);

    for tab in tabs {
        tab.session.shutdown().await;
    }
}
