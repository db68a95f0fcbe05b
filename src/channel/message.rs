//! Wire format of the meter queue.
//!
//! Messages are encoded with an explicit kind tag:
//!
//! ```text
//! {"kind":"reading","time":0,"val":512.3}
//! {"kind":"end"}
//! ```
//!
//! Decoding also accepts the untagged legacy forms `{"time":..,"val":..}` and
//! `{}`, the latter meaning end of stream.

use serde::{Deserialize, Serialize};

use crate::sim::types::Reading;

/// One message on the meter queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Reading(Reading),
    /// End of stream; always the last message of a run.
    End,
}

/// Empty mapping; rejects any field.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyMap {}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Tagged(Message),
    LegacyReading(Reading),
    LegacyEnd(EmptyMap),
}

/// A body that is not a valid message.
#[derive(Debug, thiserror::Error)]
#[error("undecodable message body {body:?}: {source}")]
pub struct DecodeError {
    pub body: String,
    #[source]
    pub source: serde_json::Error,
}

impl Message {
    /// Encodes the message as a JSON body.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a JSON body, accepting both tagged and legacy forms.
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_str(body).map_err(|source| DecodeError {
            body: body.to_string(),
            source,
        })?;
        Ok(match wire {
            WireMessage::Tagged(msg) => msg,
            WireMessage::LegacyReading(reading) => Self::Reading(reading),
            WireMessage::LegacyEnd(EmptyMap {}) => Self::End,
        })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}
