//! The message-broker interface.
//!
//! A message carries one work-item id (decimal ASCII) and supports
//! acknowledge, negative-acknowledge-with-delay, and touch. Any broker
//! offering those primitives can implement [`MessageDelegate`] and
//! [`Queue`]; [`LocalQueue`] is the channel-backed implementation used
//! by tests and single-process runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, WorkerError};

/// Broker-side operations on one delivered message.
#[async_trait]
pub trait MessageDelegate: Send + Sync {
    /// Acknowledge: the message is done and will not be redelivered.
    async fn finish(&self);

    /// Negative-acknowledge: redeliver after the given delay.
    async fn requeue(&self, delay: Duration);

    /// Extend the message's visibility window.
    async fn touch(&self);
}

/// One delivery from the broker.
#[derive(Clone)]
pub struct Message {
    /// Raw payload: a work-item id in decimal ASCII
    pub body: String,

    /// How many times this message has been delivered
    pub attempts: u32,

    delegate: Arc<dyn MessageDelegate>,
}

impl Message {
    pub fn new(body: impl Into<String>, delegate: Arc<dyn MessageDelegate>) -> Self {
        Self {
            body: body.into(),
            attempts: 1,
            delegate,
        }
    }

    /// The work-item id this message names.
    pub fn work_item_id(&self) -> Result<i64> {
        self.body
            .trim()
            .parse()
            .map_err(|_| WorkerError::InvalidMessage(self.body.clone()))
    }

    pub async fn finish(&self) {
        self.delegate.finish().await;
    }

    pub async fn requeue(&self, delay: Duration) {
        self.delegate.requeue(delay).await;
    }

    pub async fn touch(&self) {
        self.delegate.touch().await;
    }
}

/// A topic-based message source and sink.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Receive deliveries for a topic. Call once per consumer.
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Message>;

    /// Publish a work-item id to a topic.
    async fn publish(&self, topic: &str, work_item_id: i64) -> Result<()>;
}

/// In-process queue backed by bounded channels.
pub struct LocalQueue {
    capacity: usize,
    topics: Mutex<HashMap<String, mpsc::Sender<Message>>>,
}

impl LocalQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            topics: Mutex::new(HashMap::new()),
        })
    }

    fn sender(&self, topic: &str) -> Option<mpsc::Sender<Message>> {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(topic).cloned())
    }

    /// Drop the topic's sender so its receiver ends after draining.
    /// Used by one-shot runs that seed a fixed set of items.
    pub fn close_topic(&self, topic: &str) {
        if let Ok(mut topics) = self.topics.lock() {
            topics.remove(topic);
        }
    }
}

#[async_trait]
impl Queue for LocalQueue {
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Message> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        if let Ok(mut topics) = self.topics.lock() {
            topics.insert(topic.to_string(), sender);
        }
        receiver
    }

    async fn publish(&self, topic: &str, work_item_id: i64) -> Result<()> {
        let Some(sender) = self.sender(topic) else {
            // No consumer for the topic; in-process queues drop these
            // the way a broker drops messages with no channel.
            debug!(topic, work_item_id, "No subscriber for topic, dropping message");
            return Ok(());
        };
        let delegate = Arc::new(LocalDelegate {
            sender: sender.clone(),
            body: work_item_id.to_string(),
        });
        sender
            .send(Message::new(work_item_id.to_string(), delegate))
            .await
            .map_err(|_| WorkerError::InvalidMessage("queue receiver dropped".to_string()))?;
        Ok(())
    }
}

/// Delegate for [`LocalQueue`] messages: requeue re-sends the body
/// after the delay; finish and touch are no-ops.
struct LocalDelegate {
    sender: mpsc::Sender<Message>,
    body: String,
}

#[async_trait]
impl MessageDelegate for LocalDelegate {
    async fn finish(&self) {}

    async fn requeue(&self, delay: Duration) {
        let sender = self.sender.clone();
        let body = self.body.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let delegate = Arc::new(LocalDelegate {
                sender: sender.clone(),
                body: body.clone(),
            });
            let mut message = Message::new(body, delegate);
            message.attempts += 1;
            let _ = sender.send(message).await;
        });
    }

    async fn touch(&self) {}
}

/// What happened to a message, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateOperation {
    Finish,
    Requeue(Duration),
    Touch,
}

/// Delegate that records the operations applied to a message.
#[derive(Default)]
pub struct RecordingDelegate {
    operations: Mutex<Vec<DelegateOperation>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn operations(&self) -> Vec<DelegateOperation> {
        self.operations.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// The final operation applied, if any.
    pub fn last_operation(&self) -> Option<DelegateOperation> {
        self.operations().last().cloned()
    }

    fn record(&self, operation: DelegateOperation) {
        if let Ok(mut ops) = self.operations.lock() {
            ops.push(operation);
        }
    }
}

#[async_trait]
impl MessageDelegate for RecordingDelegate {
    async fn finish(&self) {
        self.record(DelegateOperation::Finish);
    }

    async fn requeue(&self, delay: Duration) {
        self.record(DelegateOperation::Requeue(delay));
    }

    async fn touch(&self) {
        self.record(DelegateOperation::Touch);
    }
}
