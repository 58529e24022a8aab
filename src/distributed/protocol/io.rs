use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DistributedError;

use super::types::Envelope;

pub(crate) const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;
/// Read limit per frame: the largest payload plus its newline.
const MAX_FRAME_BYTES: u64 = MAX_MESSAGE_BYTES as u64 + 1;

/// Reads one newline-delimited JSON envelope.
///
/// At most one maximal frame is buffered; a longer line is rejected without
/// reading the rest of it.
///
/// # Errors
///
/// Returns an error when the peer closed the connection, the frame is too
/// large or not UTF-8, or the JSON is not an envelope.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Envelope, DistributedError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let bytes = (&mut *reader)
        .take(MAX_FRAME_BYTES)
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(|err| DistributedError::Io {
            context: "read envelope",
            source: err,
        })?;
    if bytes == 0 {
        return Err(DistributedError::ConnectionClosed);
    }
    if buffer.len() > MAX_MESSAGE_BYTES && !buffer.ends_with(b"\n") {
        return Err(DistributedError::WireMessageTooLarge {
            max_bytes: MAX_MESSAGE_BYTES,
        });
    }
    if buffer.ends_with(b"\n") {
        buffer.pop();
        if buffer.ends_with(b"\r") {
            buffer.pop();
        }
    }
    let line = std::str::from_utf8(&buffer)
        .map_err(|err| DistributedError::WireMessageInvalidUtf8 { source: err })?;
    serde_json::from_str::<Envelope>(line).map_err(|err| DistributedError::Deserialize {
        context: "envelope",
        source: err,
    })
}

/// Writes one envelope followed by a newline.
///
/// # Errors
///
/// Returns an error when encoding or the write fails.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<(), DistributedError>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_string(envelope).map_err(|err| DistributedError::Serialize {
        context: "envelope",
        source: err,
    })?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|err| DistributedError::Io {
            context: "send envelope",
            source: err,
        })
}
