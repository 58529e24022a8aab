use thiserror::Error;

/// Payload section named in decode errors.
#[derive(Debug, Error, Clone, Copy)]
pub enum EnvelopeField {
    #[error("hatch")]
    Hatch,
    #[error("stats")]
    Stats,
    #[error("exception")]
    Exception,
    #[error("heartbeat")]
    Heartbeat,
}

#[derive(Debug, Error)]
pub enum DistributedError {
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection error to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection closed.")]
    ConnectionClosed,
    #[error("Message channel closed.")]
    ChannelClosed,
    #[error("Wire message exceeded max size ({max_bytes} bytes).")]
    WireMessageTooLarge { max_bytes: usize },
    #[error("Wire message was not valid UTF-8: {source}")]
    WireMessageInvalidUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Serialization error during {context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Deserialization error during {context}: {source}")]
    Deserialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Malformed {field} payload: {source}")]
    MalformedPayload {
        field: EnvelopeField,
        #[source]
        source: serde_json::Error,
    },
    #[error("Envelope has no node id.")]
    MissingNodeId,
    #[error("No connected node with id '{node_id}'.")]
    UnknownNode { node_id: String },
    #[error("Timed out waiting for {expected} workers (got {actual}).")]
    WorkerWaitTimeout { expected: usize, actual: usize },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
