//! Wire envelopes exchanged between the coordinator and its workers.
mod io;
mod types;

pub use io::{read_envelope, write_envelope};
pub use types::{
    Envelope, ExceptionPayload, HatchPayload, HeartbeatPayload, Message, MessageKind,
    StatsPayload,
};
