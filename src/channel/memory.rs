//! In-process broker backed by unbounded tokio channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::{ChannelError, Delivery, DeliveryMode, Publisher, Subscriber};

struct MemoryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
    /// Parked while no subscriber holds it.
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl MemoryQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// Named FIFO queues shared between tasks of one process.
///
/// Queues are declared on first use by either side and keep their backlog
/// while no subscriber is attached. Each queue has at most one subscriber.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, MemoryQueue>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a publisher on `queue`, declaring it if needed.
    pub fn publisher(&self, queue: &str) -> MemoryPublisher {
        let tx = self
            .lock()
            .entry(queue.to_string())
            .or_insert_with(MemoryQueue::new)
            .tx
            .clone();
        MemoryPublisher {
            queue: queue.to_string(),
            tx,
        }
    }

    /// Attaches the single subscriber of `queue`, declaring it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyConsumed`] while another subscriber is attached.
    pub fn subscribe(&self, queue: &str) -> Result<MemorySubscriber, ChannelError> {
        let rx = self
            .lock()
            .entry(queue.to_string())
            .or_insert_with(MemoryQueue::new)
            .rx
            .take()
            .ok_or_else(|| ChannelError::AlreadyConsumed {
                queue: queue.to_string(),
            })?;
        Ok(MemorySubscriber {
            queue: queue.to_string(),
            rx,
            broker: self.clone(),
        })
    }

    fn park(&self, queue: &str, rx: mpsc::UnboundedReceiver<Delivery>) {
        if let Some(q) = self.lock().get_mut(queue) {
            q.rx = Some(rx);
        }
    }
}

/// Producer handle of an in-memory queue.
pub struct MemoryPublisher {
    queue: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Publisher for MemoryPublisher {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn publish(&mut self, body: &str, mode: DeliveryMode) -> Result<(), ChannelError> {
        self.tx
            .send(Delivery::new(body, mode))
            .map_err(|_| ChannelError::QueueClosed {
                queue: self.queue.clone(),
            })
    }

    async fn close(self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Consumer handle of an in-memory queue.
///
/// Dropping it without [`Subscriber::close`] discards the queue's receiver,
/// after which publishing fails with [`ChannelError::QueueClosed`].
pub struct MemorySubscriber {
    queue: String,
    rx: mpsc::UnboundedReceiver<Delivery>,
    broker: InMemoryBroker,
}

impl Subscriber for MemorySubscriber {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn recv(&mut self) -> Result<Option<Delivery>, ChannelError> {
        Ok(self.rx.recv().await)
    }

    async fn close(self) -> Result<(), ChannelError> {
        self.broker.park(&self.queue, self.rx);
        Ok(())
    }
}
