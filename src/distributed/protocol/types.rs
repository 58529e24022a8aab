use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DistributedError, EnvelopeField};
use crate::exceptions::ExceptionReport;
use crate::hatch::{HatchRate, Population};
use crate::runner::RunnerState;
use crate::stats::{RequestErrorReport, StatsEntryReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ClientReady,
    ClientStop,
    Quit,
    Hatch,
    Stats,
    Exception,
    Heartbeat,
}

/// The unit transmitted over a message channel.
///
/// `payload` stays an untyped structured value on the wire; [`Envelope::decode`]
/// turns it into a typed [`Message`] according to `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    #[must_use]
    pub fn new(kind: MessageKind, node_id: Option<String>, payload: Value) -> Self {
        Self {
            kind,
            node_id,
            payload,
        }
    }

    /// Decodes the payload into the typed message for this envelope's kind.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload does not match the shape required by
    /// the envelope type.
    pub fn decode(&self) -> Result<Message, DistributedError> {
        match self.kind {
            MessageKind::ClientReady => Ok(Message::ClientReady),
            MessageKind::ClientStop => Ok(Message::ClientStop),
            MessageKind::Quit => Ok(Message::Quit),
            MessageKind::Hatch => decode_payload(&self.payload, EnvelopeField::Hatch)
                .map(Message::Hatch),
            MessageKind::Stats => decode_payload(&self.payload, EnvelopeField::Stats)
                .map(|payload| Message::Stats(Box::new(payload))),
            MessageKind::Exception => decode_payload(&self.payload, EnvelopeField::Exception)
                .map(Message::Exception),
            MessageKind::Heartbeat => decode_payload(&self.payload, EnvelopeField::Heartbeat)
                .map(Message::Heartbeat),
        }
    }
}

fn decode_payload<T>(payload: &Value, field: EnvelopeField) -> Result<T, DistributedError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(payload).map_err(|err| DistributedError::MalformedPayload { field, source: err })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ClientReady,
    ClientStop,
    Quit,
    Hatch(HatchPayload),
    Stats(Box<StatsPayload>),
    Exception(ExceptionPayload),
    Heartbeat(HeartbeatPayload),
}

impl Message {
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Message::ClientReady => MessageKind::ClientReady,
            Message::ClientStop => MessageKind::ClientStop,
            Message::Quit => MessageKind::Quit,
            Message::Hatch(_) => MessageKind::Hatch,
            Message::Stats(_) => MessageKind::Stats,
            Message::Exception(_) => MessageKind::Exception,
            Message::Heartbeat(_) => MessageKind::Heartbeat,
        }
    }

    /// Wraps the message in an envelope addressed from/to `node_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn into_envelope(self, node_id: Option<String>) -> Result<Envelope, DistributedError> {
        let kind = self.kind();
        let payload = match self {
            Message::ClientReady | Message::ClientStop | Message::Quit => Value::Null,
            Message::Hatch(payload) => encode_payload(&payload)?,
            Message::Stats(payload) => encode_payload(&payload)?,
            Message::Exception(payload) => encode_payload(&payload)?,
            Message::Heartbeat(payload) => encode_payload(&payload)?,
        };
        Ok(Envelope::new(kind, node_id, payload))
    }
}

fn encode_payload<T>(payload: &T) -> Result<Value, DistributedError>
where
    T: Serialize,
{
    serde_json::to_value(payload).map_err(|err| DistributedError::Serialize {
        context: "envelope payload",
        source: err,
    })
}

/// Per-worker hatch command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchPayload {
    pub count: Population,
    #[serde(default)]
    pub rate: Option<HatchRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsPayload {
    pub stats: Vec<StatsEntryReport>,
    pub stats_total: StatsEntryReport,
    pub errors: Vec<ExceptionReport>,
    pub user_count: u64,
    #[serde(default)]
    pub request_errors: Vec<RequestErrorReport>,
}

pub type ExceptionPayload = ExceptionReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub user_count: u64,
    pub state: RunnerState,
}
