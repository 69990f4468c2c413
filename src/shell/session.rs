// A session is one host connection to the shared store (a tab or window of the host application).
//
// Responsibilities
// - Receive one-way commands from the host and answer with one-way messages on the host's channel.
// - Wait for the process-wide store before running anything. Commands sent earlier stay queued.
// - If the store fails to open, reject that command and try opening again for the next one.
// - Run commands in the order they were sent, each to completion, one unit of work at a time.
// - Relay stream changes announced by other sessions to the host, independently of command processing.
//
// Failures never cross this boundary except as a typed HostMessage.

use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::modules::event_streams::core::errors::AppendError;
use crate::modules::event_streams::use_cases::append_to_stream::handler::AppendToStreamHandler;
use crate::modules::event_streams::use_cases::create_stream_and_append::command::CreateStreamAndAppend;
use crate::modules::event_streams::use_cases::create_stream_and_append::handler::CreateStreamHandler;
use crate::modules::event_streams::use_cases::hydrate_stream::handler::HydrateStreamHandler;
use crate::shared::core::primitives::EventEnvelope;
use crate::shared::infrastructure::change_notifier::{ChangeNotifier, ChangeSubscription};
use crate::shared::infrastructure::durable_store::DurableStore;
use crate::shared::infrastructure::durable_store::lazy::LazyStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    AppendToStream { envelope: EventEnvelope },
    CreateStreamAndAppend(CreateStreamAndAppend),
    HydrateStream { stream_id: String },
}

/// Outcome of an append or create, shaped as `{"ok": bool, "value": ...}` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceResult(pub Result<EventEnvelope, AppendError>);

impl Serialize for PersistenceResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PersistenceResult", 2)?;
        match &self.0 {
            Ok(envelope) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("value", envelope)?;
            }
            Err(err) => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("value", err)?;
            }
        }
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    PersistenceResult(PersistenceResult),
    StreamHydrated {
        stream_id: String,
        events: Vec<EventEnvelope>,
    },
    RemoteStreamChanged {
        stream_id: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("session is closed")]
pub struct SessionClosed;

pub struct SessionHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
    worker: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl SessionHandle {
    /// One-way send. The answer, if any, arrives on the host channel given to `spawn_session`.
    pub fn send(&self, command: HostCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }

    /// Stops accepting commands, finishes the queued ones and stops relaying changes.
    pub async fn shutdown(self) {
        let Self {
            commands,
            worker,
            relay,
        } = self;
        drop(commands);
        if let Err(err) = worker.await {
            warn!(error = %err, "Session worker ended abnormally");
        }
        relay.abort();
    }
}

pub fn spawn_session<TStore, TNotifier>(
    store: LazyStore<TStore>,
    notifier: TNotifier,
    host: mpsc::UnboundedSender<HostMessage>,
) -> SessionHandle
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    let (commands, queue) = mpsc::unbounded_channel();
    let notifier = Arc::new(notifier);
    let subscription = notifier.subscribe();
    let relay = tokio::spawn(relay_changes(subscription, host.clone()).instrument(info_span!("relay")));
    let worker = tokio::spawn(process_commands(store, notifier, queue, host).instrument(info_span!("session")));
    SessionHandle {
        commands,
        worker,
        relay,
    }
}

async fn relay_changes(
    mut subscription: impl ChangeSubscription,
    host: mpsc::UnboundedSender<HostMessage>,
) {
    while let Some(change) = subscription.recv().await {
        debug!(stream_id = %change.stream_id, "Relaying change from another session");
        let message = HostMessage::RemoteStreamChanged {
            stream_id: change.stream_id,
        };
        if host.send(message).is_err() {
            debug!("Host stopped listening, ending relay");
            return;
        }
    }
}

struct SessionHandlers<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    append: AppendToStreamHandler<TStore, TNotifier>,
    create: CreateStreamHandler<TStore, TNotifier>,
    hydrate: HydrateStreamHandler<TStore>,
}

impl<TStore, TNotifier> SessionHandlers<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    fn new(store: Arc<TStore>, notifier: Arc<TNotifier>) -> Self {
        Self {
            append: AppendToStreamHandler::new(store.clone(), notifier.clone()),
            create: CreateStreamHandler::new(store.clone(), notifier),
            hydrate: HydrateStreamHandler::new(store),
        }
    }

    async fn execute(&self, command: HostCommand) -> Option<HostMessage> {
        match command {
            HostCommand::AppendToStream { envelope } => Some(HostMessage::PersistenceResult(
                PersistenceResult(self.append.handle(envelope).await),
            )),
            HostCommand::CreateStreamAndAppend(command) => Some(HostMessage::PersistenceResult(
                PersistenceResult(self.create.handle(command).await),
            )),
            HostCommand::HydrateStream { stream_id } => match self.hydrate.handle(&stream_id).await {
                Ok(events) => Some(HostMessage::StreamHydrated { stream_id, events }),
                Err(err) => {
                    error!(stream_id = %stream_id, error = %err, "Error hydrating stream");
                    None
                }
            },
        }
    }
}

fn reject_unavailable(command: HostCommand, reason: &str) -> Option<HostMessage> {
    match command {
        HostCommand::AppendToStream { .. } | HostCommand::CreateStreamAndAppend(_) => {
            Some(HostMessage::PersistenceResult(PersistenceResult(Err(
                AppendError::StoreUnavailable(reason.to_string()),
            ))))
        }
        HostCommand::HydrateStream { stream_id } => {
            error!(stream_id = %stream_id, "hydrate-stream dropped: durable store unavailable");
            None
        }
    }
}

async fn process_commands<TStore, TNotifier>(
    store: LazyStore<TStore>,
    notifier: Arc<TNotifier>,
    mut queue: mpsc::UnboundedReceiver<HostCommand>,
    host: mpsc::UnboundedSender<HostMessage>,
) where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    let mut handlers: Option<SessionHandlers<TStore, TNotifier>> = None;

    while let Some(command) = queue.recv().await {
        if handlers.is_none() {
            match store.ready().await {
                Ok(opened) => handlers = Some(SessionHandlers::new(opened, notifier.clone())),
                Err(err) => {
                    warn!(error = %err, "Durable store unavailable, retrying on the next command");
                    if !deliver(&host, reject_unavailable(command, &err.to_string())) {
                        return;
                    }
                    continue;
                }
            }
        }
        if let Some(handlers) = &handlers {
            if !deliver(&host, handlers.execute(command).await) {
                return;
            }
        }
    }
}

/// False once the host has stopped listening.
fn deliver(host: &mpsc::UnboundedSender<HostMessage>, reply: Option<HostMessage>) -> bool {
    let Some(message) = reply else {
        return true;
    };
    if host.send(message).is_err() {
        debug!("Host stopped listening, ending session");
        return false;
    }
    true
}
