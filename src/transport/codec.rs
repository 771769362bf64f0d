//! Tokio codec over a [`Session`].
//!
//! Wrapping any `AsyncRead + AsyncWrite` in `Framed<_, MavlinkCodec>` yields a
//! `Stream` of decoded messages and a `Sink` accepting messages to pack.
//!
//! In strict mode a frame error is returned from the stream, which ends a
//! `Framed` stream. Use robust parsing for links that must survive garbage.

use crate::core::message::MessageInstance;
use crate::error::{ProtocolError, Result};
use crate::protocol::session::Session;
use crate::protocol::StreamDecoder;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

/// `Decoder`/`Encoder` pair driven by one session.
#[derive(Debug)]
pub struct MavlinkCodec {
    session: Session,
}

impl MavlinkCodec {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Wrap an async byte stream.
    pub fn framed<T>(io: T, session: Session) -> Framed<T, Self>
    where
        T: AsyncRead + AsyncWrite,
    {
        Framed::new(io, Self::new(session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}

impl Decoder for MavlinkCodec {
    type Item = MessageInstance;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // The session keeps its own buffer, so take everything offered.
        let chunk = src.split();
        self.session.parse_char(&chunk)
    }
}

impl Encoder<MessageInstance> for MavlinkCodec {
    type Error = ProtocolError;

    fn encode(&mut self, mut item: MessageInstance, dst: &mut BytesMut) -> Result<()> {
        self.session.send(&mut item, dst, false)
    }
}

impl StreamDecoder for MavlinkCodec {
    /// Drives the `Decoder` impl the way `FramedRead` does: offer the bytes,
    /// then keep calling with an empty buffer until nothing more comes out.
    fn decode_stream(&mut self, bytes: &[u8]) -> Vec<Result<MessageInstance>> {
        let mut src = BytesMut::from(bytes);
        let mut outcomes = Vec::new();
        loop {
            match self.decode(&mut src) {
                Ok(Some(msg)) => outcomes.push(Ok(msg)),
                Ok(None) => break,
                Err(e) => outcomes.push(Err(e)),
            }
        }
        outcomes
    }
}
