//! Pipeline Events
//!
//! Telemetry emitted by the stage controller, the fan-out executor and the
//! interaction loops. Events are delivered through an explicit `EventSink`
//! handed to the controller; there is no global subscriber.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::{RunStatus, StageName};

/// Progress event for a single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
    },
    StageStarted {
        run_id: String,
        stage: StageName,
    },
    StageCompleted {
        run_id: String,
        stage: StageName,
        /// Items in the stage artifact produced by the fallback path
        degraded_items: usize,
    },
    StageFailed {
        run_id: String,
        stage: StageName,
        error: String,
    },
    /// A single item was replaced by a synthesized record
    ItemDegraded {
        label: String,
        reason: String,
    },
    /// A retryable failure occurred and another attempt is scheduled
    RetryScheduled {
        label: String,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    TurnAppended {
        sequence: usize,
        speaker: String,
        degraded: bool,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Cloneable handle for emitting `PipelineEvent`s.
///
/// A disabled sink drops every event. A closed receiver is not an error for
/// the pipeline; the event is simply lost.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a sink and the receiving end of its channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::trace!("event receiver dropped");
            }
        }
    }
}
