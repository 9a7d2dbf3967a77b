//! Progress stream events and the sinks that receive them.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

// == Stream Event ==
/// One signal of a batch run. Serialises to the event payload only; the
/// variant name travels separately as the event type (see [`StreamEvent::name`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent<T> {
    Started {
        total: usize,
    },
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    Batch {
        #[serde(rename = "batchNumber")]
        batch_number: usize,
        #[serde(rename = "totalBatches")]
        total_batches: usize,
        data: Vec<T>,
    },
    Complete {
        success: bool,
    },
    Error {
        message: String,
    },
}

impl<T> StreamEvent<T> {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Started { .. } => "started",
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Batch { .. } => "batch",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

// == Progress Sink ==
#[async_trait]
pub trait ProgressSink<T>: Send + Sync {
    async fn emit(&self, event: StreamEvent<T>);
}

/// Forwards events to a connected client.
///
/// A closed receiver means the client went away. The run keeps going so its
/// results still reach the cache; the disconnect is logged once.
pub struct ChannelSink<T> {
    sender: mpsc::Sender<StreamEvent<T>>,
    disconnected: AtomicBool,
}

impl<T> ChannelSink<T> {
    pub fn new(sender: mpsc::Sender<StreamEvent<T>>) -> Self {
        Self {
            sender,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<T> ProgressSink<T> for ChannelSink<T>
where
    T: Send + Sync + 'static,
{
    async fn emit(&self, event: StreamEvent<T>) {
        if self.is_disconnected() {
            return;
        }
        let name = event.name();
        if self.sender.send(event).await.is_err()
            && !self.disconnected.swap(true, Ordering::Relaxed)
        {
            warn!(event = name, "client disconnected, continuing run to warm cache");
        }
    }
}

/// Collects every event in order.
pub struct RecordingSink<T> {
    events: Mutex<Vec<StreamEvent<T>>>,
}

impl<T: Clone> Default for RecordingSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RecordingSink<T> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub async fn events(&self) -> Vec<StreamEvent<T>> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl<T> ProgressSink<T> for RecordingSink<T>
where
    T: Send + Sync + 'static,
{
    async fn emit(&self, event: StreamEvent<T>) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shapes() {
        let batch: StreamEvent<u8> = StreamEvent::Batch {
            batch_number: 2,
            total_batches: 3,
            data: vec![1, 2],
        };
        assert_eq!(batch.name(), "batch");
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({ "batchNumber": 2, "totalBatches": 3, "data": [1, 2] })
        );

        let progress: StreamEvent<u8> = StreamEvent::Progress {
            current: 5,
            total: 12,
            message: "Processed 5 of 12".into(),
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({ "current": 5, "total": 12, "message": "Processed 5 of 12" })
        );

        let complete: StreamEvent<u8> = StreamEvent::Complete { success: true };
        assert!(complete.is_terminal());
        assert_eq!(serde_json::to_value(&complete).unwrap(), json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_channel_sink_survives_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let sink = ChannelSink::<u8>::new(tx);

        sink.emit(StreamEvent::Started { total: 1 }).await;
        drop(rx);
        sink.emit(StreamEvent::Complete { success: true }).await;
        sink.emit(StreamEvent::Complete { success: true }).await;

        assert!(sink.is_disconnected());
    }
}
