//! Ordered message channel between the meter and the PV simulator.
//!
//! The core only needs a FIFO pipe of UTF-8 bodies addressed to a named
//! queue. Two backends implement it:
//! - [`memory`]: in-process broker for single-process runs and tests
//! - [`tcp`]: clients for the bundled [`relay`] broker, for split processes

pub mod memory;
pub mod message;
pub mod relay;
pub mod tcp;

use std::future::Future;
use std::io;

use serde::{Deserialize, Serialize};

pub use memory::InMemoryBroker;
pub use message::{DecodeError, Message};

/// Queue the meter publishes to unless configured otherwise.
pub const DEFAULT_QUEUE: &str = "meter";

/// Persistence hint attached to a published message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Transient,
    /// Must survive until a consumer has taken it; used for the end marker.
    Durable,
}

/// A message body as handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub mode: DeliveryMode,
    pub body: String,
}

impl Delivery {
    pub fn new(body: impl Into<String>, mode: DeliveryMode) -> Self {
        Self {
            mode,
            body: body.into(),
        }
    }
}

/// Transport failures.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("cannot connect to broker at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("broker I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed broker frame: {0}")]
    Frame(#[source] serde_json::Error),

    #[error("queue \"{queue}\" already has a consumer")]
    AlreadyConsumed { queue: String },

    #[error("queue \"{queue}\" is no longer accepting messages")]
    QueueClosed { queue: String },

    #[error("broker rejected request: {0}")]
    Rejected(String),
}

/// Producer side of a named queue.
///
/// Publishing is fire-and-forget: implementations never wait for a consumer.
pub trait Publisher {
    /// Name of the queue this publisher writes to.
    fn queue(&self) -> &str;

    /// Appends `body` to the queue.
    fn publish(
        &mut self,
        body: &str,
        mode: DeliveryMode,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Flushes and releases the connection.
    fn close(self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Consumer side of a named queue.
pub trait Subscriber {
    /// Name of the queue this subscriber reads from.
    fn queue(&self) -> &str;

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the transport has ended the subscription.
    /// Must be cancel safe.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Delivery>, ChannelError>> + Send;

    /// Releases the subscription; undelivered messages stay on the queue.
    fn close(self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}
