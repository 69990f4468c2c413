// Line-delimited JSON transport between one host process and its sessions.
//
// Responsibilities
// - Read `{"session": n, "command": {...}}` lines and route each command to session n.
// - Write every session message as `{"session": n, "message": {...}}` on its own line.
// - At end of input, let each session finish its queued commands, then flush and return.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::shared::infrastructure::change_notifier::broadcast::BroadcastHub;
use crate::shared::infrastructure::durable_store::DurableStore;
use crate::shared::infrastructure::durable_store::lazy::LazyStore;
use crate::shell::session::{HostCommand, HostMessage, spawn_session};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    pub session: usize,
    pub command: HostCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    pub session: usize,
    pub message: HostMessage,
}

pub async fn serve<TStore, R, W>(
    store: LazyStore<TStore>,
    hub: &BroadcastHub,
    sessions: usize,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    TStore: DurableStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    let mut handles = Vec::with_capacity(sessions);
    let mut forwarders = Vec::with_capacity(sessions);
    for session in 0..sessions {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        handles.push(spawn_session(store.clone(), hub.join(), host_tx));
        let frames_tx = frames_tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(message) = host_rx.recv().await {
                if frames_tx.send(OutboundFrame { session, message }).is_err() {
                    return;
                }
            }
        }));
    }
    info!(sessions, "Sessions started");

    let read = async move {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("reading host input")? {
            if line.trim().is_empty() {
                continue;
            }
            let frame: InboundFrame = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "Ignoring malformed command line");
                    continue;
                }
            };
            match handles.get(frame.session) {
                Some(handle) => {
                    if let Err(err) = handle.send(frame.command) {
                        warn!(session = frame.session, error = %err, "Command not delivered");
                    }
                }
                None => warn!(session = frame.session, "Command for unknown session"),
            }
        }
        debug!("Host input closed, draining sessions");
        for handle in handles {
            handle.shutdown().await;
        }
        for forwarder in forwarders {
            forwarder.await.context("joining session forwarder")?;
        }
        drop(frames_tx);
        Ok::<_, anyhow::Error>(())
    };

    let write = async move {
        while let Some(frame) = frames_rx.recv().await {
            let mut line = serde_json::to_vec(&frame).context("encoding host message")?;
            line.push(b'\n');
            output.write_all(&line).await.context("writing host output")?;
            output.flush().await.context("flushing host output")?;
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::try_join!(read, write)?;
    info!("Sessions stopped");
    Ok(())
}
