//! Minimal TCP message relay.
//!
//! Holds one FIFO per queue name, buffers messages until a consumer attaches
//! and forwards them in publication order. Messages live in memory only; the
//! durable flag is carried through to consumers but not written to disk.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ChannelError;
use super::Delivery;
use super::tcp::{Frame, write_frame};
use crate::shutdown::Shutdown;

#[derive(Default)]
struct RelayQueue {
    backlog: VecDeque<Delivery>,
    consumer: Option<mpsc::UnboundedSender<Delivery>>,
}

type Queues = Arc<Mutex<HashMap<String, RelayQueue>>>;

fn lock(queues: &Queues) -> MutexGuard<'_, HashMap<String, RelayQueue>> {
    queues.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bound relay, ready to [`serve`](Relay::serve).
pub struct Relay {
    listener: TcpListener,
    queues: Queues,
}

impl Relay {
    /// Binds the relay to `addr` (`host:port`; port 0 picks a free port).
    pub async fn bind(addr: &str) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ChannelError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            queues: Queues::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` fires.
    pub async fn serve(self, mut shutdown: Shutdown) -> Result<(), ChannelError> {
        let addr = self.local_addr()?;
        info!(%addr, "relay listening");
        loop {
            tokio::select! {
                _ = shutdown.triggered() => {
                    info!(%addr, "relay shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };
                    debug!(%peer, "relay connection opened");
                    let queues = Arc::clone(&self.queues);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, queues).await {
                            warn!(%peer, error = %err, "relay connection failed");
                        }
                        debug!(%peer, "relay connection closed");
                    });
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, queues: Queues) -> Result<(), ChannelError> {
    let (read, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        match Frame::parse(&line)? {
            Frame::Declare { queue } => {
                lock(&queues).entry(queue).or_default();
            }
            Frame::Publish { queue, mode, body } => {
                enqueue(&queues, queue, Delivery { mode, body });
            }
            Frame::Consume { queue } => {
                return serve_consumer(&queues, queue, lines, writer).await;
            }
            other => {
                let message = format!("unexpected frame from client: {other:?}");
                write_frame(&mut writer, &Frame::Error { message }).await?;
                return Ok(());
            }
        }
    }
    Ok(())
}

fn enqueue(queues: &Queues, queue: String, delivery: Delivery) {
    let mut guard = lock(queues);
    let q = guard.entry(queue).or_default();
    if let Some(tx) = &q.consumer {
        if let Err(mpsc::error::SendError(delivery)) = tx.send(delivery) {
            q.consumer = None;
            q.backlog.push_back(delivery);
        }
    } else {
        q.backlog.push_back(delivery);
    }
}

fn attach(
    queues: &Queues,
    queue: &str,
    tx: mpsc::UnboundedSender<Delivery>,
) -> Result<(), ChannelError> {
    let mut guard = lock(queues);
    let q = guard.entry(queue.to_string()).or_default();
    if q.consumer.as_ref().is_some_and(|c| !c.is_closed()) {
        return Err(ChannelError::AlreadyConsumed {
            queue: queue.to_string(),
        });
    }
    for delivery in q.backlog.drain(..) {
        // rx is alive in the caller, so this cannot fail.
        let _ = tx.send(delivery);
    }
    q.consumer = Some(tx);
    Ok(())
}

/// Puts everything the departing consumer did not receive back at the head
/// of the queue, ahead of anything published meanwhile.
///
/// The receiver is closed and drained under the queue lock, so no consumer
/// can attach in between. The registration is cleared only if it still
/// belongs to `tx`.
fn detach(
    queues: &Queues,
    queue: &str,
    tx: &mpsc::UnboundedSender<Delivery>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    unsent: Option<Delivery>,
) {
    let mut guard = lock(queues);
    rx.close();
    let mut leftover: Vec<Delivery> = unsent.into_iter().collect();
    while let Ok(delivery) = rx.try_recv() {
        leftover.push(delivery);
    }

    let q = guard.entry(queue.to_string()).or_default();
    if q.consumer.as_ref().is_some_and(|c| c.same_channel(tx)) {
        q.consumer = None;
    }
    for delivery in leftover.into_iter().rev() {
        q.backlog.push_front(delivery);
    }
}

async fn serve_consumer(
    queues: &Queues,
    queue: String,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut writer: OwnedWriteHalf,
) -> Result<(), ChannelError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Err(err) = attach(queues, &queue, tx.clone()) {
        let message = err.to_string();
        write_frame(&mut writer, &Frame::Error { message }).await?;
        return Ok(());
    }
    debug!(queue, "consumer attached");

    let mut unsent = None;
    let result = loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(delivery) = next else { break Ok(()) };
                let frame = Frame::Deliver {
                    mode: delivery.mode,
                    body: delivery.body.clone(),
                };
                if let Err(err) = write_frame(&mut writer, &frame).await {
                    unsent = Some(delivery);
                    break Err(err);
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(_)) => {}
                Ok(None) => break Ok(()),
                Err(err) => break Err(err.into()),
            }
        }
    };

    detach(queues, &queue, &tx, rx, unsent);
    debug!(queue, "consumer detached");
    result
}
