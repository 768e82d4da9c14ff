//! Framed codec for the stdio wire protocol.
//!
//! Uses LinesCodec for framing + serde_json for serialization: one complete
//! JSON value per newline-terminated line. Works over any AsyncRead/AsyncWrite
//! (child process pipes here).

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Maximum accepted incoming line length (8 MB). A longer line surfaces as
/// an I/O error. Outbound lines are not capped.
const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Codec that frames messages as newline-terminated JSON lines.
///
/// Wraps LinesCodec and adds serde_json serialization. serde_json escapes
/// embedded newlines, so every encoded value occupies exactly one line.
#[derive(Debug)]
pub struct JsonLineCodec<T> {
    inner: LinesCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonLineCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonLineCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LINE_BYTES),
            _phantom: PhantomData,
        }
    }
}

/// Decode/encode failures, split so callers can tell a line that failed to
/// parse from a broken underlying stream.
#[derive(Debug, thiserror::Error)]
pub enum JsonLineError {
    #[error("malformed json line: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<LinesCodecError> for JsonLineError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => Self::Io(e),
            LinesCodecError::MaxLineLengthExceeded => Self::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "line exceeds maximum length",
            )),
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonLineCodec<T> {
    type Item = T;
    type Error = JsonLineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonLineCodec<T> {
    type Error = JsonLineError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item)?;
        tracing::trace!(json_size_bytes = json.len(), "Encoding line");
        self.inner.encode(json, dst)?;
        Ok(())
    }
}
