//! Line-delimited JSON clients for the relay broker.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::{ChannelError, Delivery, DeliveryMode, Publisher, Subscriber};

/// One line of the relay protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    /// Client → relay: make sure `queue` exists.
    Declare { queue: String },
    /// Client → relay: append a message to `queue`.
    Publish {
        queue: String,
        mode: DeliveryMode,
        body: String,
    },
    /// Client → relay: become the consumer of `queue`.
    Consume { queue: String },
    /// Relay → consumer: next message of the consumed queue.
    Deliver { mode: DeliveryMode, body: String },
    /// Relay → client: request refused; the relay closes the connection.
    Error { message: String },
}

impl Frame {
    pub fn parse(line: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(line).map_err(ChannelError::Frame)
    }

    pub fn to_line(&self) -> Result<String, ChannelError> {
        let mut line = serde_json::to_string(self).map_err(ChannelError::Frame)?;
        line.push('\n');
        Ok(line)
    }
}

pub(crate) async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.to_line()?.as_bytes()).await?;
    Ok(())
}

async fn connect(addr: &str) -> Result<TcpStream, ChannelError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ChannelError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Publisher connected to a relay.
pub struct TcpPublisher {
    queue: String,
    stream: TcpStream,
}

impl TcpPublisher {
    /// Connects to the relay at `addr` and declares `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the relay is unreachable. There is
    /// no retry.
    pub async fn connect(addr: &str, queue: &str) -> Result<Self, ChannelError> {
        let mut stream = connect(addr).await?;
        write_frame(
            &mut stream,
            &Frame::Declare {
                queue: queue.to_string(),
            },
        )
        .await?;
        debug!(%addr, queue, "publisher connected");
        Ok(Self {
            queue: queue.to_string(),
            stream,
        })
    }
}

impl Publisher for TcpPublisher {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn publish(&mut self, body: &str, mode: DeliveryMode) -> Result<(), ChannelError> {
        let frame = Frame::Publish {
            queue: self.queue.clone(),
            mode,
            body: body.to_string(),
        };
        write_frame(&mut self.stream, &frame).await
    }

    async fn close(mut self) -> Result<(), ChannelError> {
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Subscriber connected to a relay.
pub struct TcpSubscriber {
    queue: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpSubscriber {
    /// Connects to the relay at `addr` and attaches as the consumer of `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the relay is unreachable. A refusal
    /// by the relay surfaces on the first [`Subscriber::recv`].
    pub async fn connect(addr: &str, queue: &str) -> Result<Self, ChannelError> {
        let (read, mut writer) = connect(addr).await?.into_split();
        write_frame(
            &mut writer,
            &Frame::Consume {
                queue: queue.to_string(),
            },
        )
        .await?;
        debug!(%addr, queue, "subscriber connected");
        Ok(Self {
            queue: queue.to_string(),
            lines: BufReader::new(read).lines(),
            writer,
        })
    }
}

impl Subscriber for TcpSubscriber {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn recv(&mut self) -> Result<Option<Delivery>, ChannelError> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };
        match Frame::parse(&line)? {
            Frame::Deliver { mode, body } => Ok(Some(Delivery { mode, body })),
            Frame::Error { message } => Err(ChannelError::Rejected(message)),
            other => Err(ChannelError::Rejected(format!(
                "unexpected frame from relay: {other:?}"
            ))),
        }
    }

    async fn close(mut self) -> Result<(), ChannelError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_single_tagged_lines() {
        let frame = Frame::Publish {
            queue: "meter".into(),
            mode: DeliveryMode::Durable,
            body: r#"{"kind":"end"}"#.into(),
        };
        let line = frame.to_line().expect("frame should encode");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.starts_with(r#"{"op":"publish""#));
        assert_eq!(Frame::parse(line.trim_end()).ok(), Some(frame));
    }

    #[test]
    fn unknown_op_is_a_frame_error() {
        assert!(matches!(
            Frame::parse(r#"{"op":"purge","queue":"meter"}"#),
            Err(ChannelError::Frame(_))
        ));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails_fast() {
        // Bind then drop to obtain a port with no listener.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let addr = listener
            .local_addr()
            .expect("bound listener should have an address")
            .to_string();
        drop(listener);
        let res = TcpPublisher::connect(&addr, "meter").await;
        assert!(matches!(res, Err(ChannelError::Connect { .. })));
    }
}
