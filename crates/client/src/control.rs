//! Control channel from the hosting page.
//!
//! Messages are fire-and-forget: `post` never waits for the worker and no
//! acknowledgement is sent back. A background task hands each message to the
//! worker in arrival order.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::worker::Worker;

/// Literal payload that forces a waiting generation to activate.
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Recognized control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SkipWaiting,
}

impl ControlMessage {
    /// Recognize a payload. Only the exact string `"SKIP_WAITING"` matches.
    pub fn parse(payload: &Value) -> Option<Self> {
        match payload {
            Value::String(s) if s == SKIP_WAITING => Some(ControlMessage::SkipWaiting),
            _ => None,
        }
    }
}

/// Cloneable sending half of the control channel.
#[derive(Clone)]
pub struct ControlPoster {
    sender: mpsc::Sender<Value>,
}

impl ControlPoster {
    /// Post a message without waiting for it to be handled.
    ///
    /// A full or closed channel drops the message.
    pub fn post(&self, payload: Value) {
        if let Err(err) = self.sender.try_send(payload) {
            tracing::warn!(error = %err, "control message dropped");
        }
    }
}

/// The control channel and its listener task.
pub struct ControlChannel {
    poster: ControlPoster,
    shutdown: oneshot::Sender<()>,
    listener: JoinHandle<()>,
}

impl ControlChannel {
    /// Start listening for messages on behalf of `worker`.
    pub fn spawn(worker: Arc<Worker>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Value>(32);
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(payload) = receiver.recv() => deliver(&worker, &payload).await,
                    _ = &mut shutdown_rx => {
                        receiver.close();
                        while let Some(payload) = receiver.recv().await {
                            deliver(&worker, &payload).await;
                        }
                        break;
                    }
                }
            }
        });

        Self { poster: ControlPoster { sender }, shutdown, listener }
    }

    pub fn poster(&self) -> ControlPoster {
        self.poster.clone()
    }

    pub fn post(&self, payload: Value) {
        self.poster.post(payload);
    }

    /// Stop accepting messages and wait until every queued one is handled.
    ///
    /// Posters still held elsewhere stop delivering: their messages are dropped.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.listener.await {
            tracing::warn!(error = %err, "control listener did not finish");
        }
    }
}

async fn deliver(worker: &Worker, payload: &Value) {
    match worker.handle_message(payload).await {
        Ok(Some(report)) => {
            tracing::info!(cache = %report.cache_name, deleted = report.deleted.len(), "activated by control message");
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "control message failed"),
    }
}
