//! # Transport
//!
//! The engine never performs I/O itself. This module is the seam between a
//! [`Session`] and whatever carries the bytes: a serial port, a UDP socket,
//! a TCP stream or an in-memory buffer.
//!
//! ## Components
//! - [`Transport`]: write side, anything that accepts whole frames
//! - [`IoTransport`]: adapter for any `std::io::Write`
//! - [`Connection`]: a session bound to one transport
//! - [`codec::MavlinkCodec`]: tokio `Framed` codec for async streams

use crate::core::message::MessageInstance;
use crate::error::Result;
use crate::protocol::session::Session;
use bytes::BytesMut;
use std::io::{self, Read, Write};
use tracing::debug;

pub mod codec;

/// Read buffer size for [`Connection::read_from`]
const READ_CHUNK: usize = 1024;

/// Byte sink for packed frames.
pub trait Transport {
    /// Write one complete frame.
    fn write(&mut self, frame: &[u8]) -> Result<()>;
}

impl Transport for Vec<u8> {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.extend_from_slice(frame);
        Ok(())
    }
}

impl Transport for BytesMut {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.extend_from_slice(frame);
        Ok(())
    }
}

/// [`Transport`] over a blocking writer. Each frame is written whole and
/// flushed, so a frame is never split across datagrams on packet transports.
#[derive(Debug)]
pub struct IoTransport<W: Write> {
    inner: W,
}

impl<W: Write> IoTransport<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Transport for IoTransport<W> {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.inner.write_all(frame)?;
        self.inner.flush()?;
        Ok(())
    }
}

/// A session bound to the transport its frames are written to.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    session: Session,
    transport: T,
}

impl<T: Transport> Connection<T> {
    pub fn new(session: Session, transport: T) -> Self {
        Self { session, transport }
    }

    /// Pack and write `msg` using the session's wire version.
    pub fn send(&mut self, msg: &mut MessageInstance) -> Result<()> {
        self.session.send(msg, &mut self.transport, false)
    }

    /// Pack and write `msg` as a version 1 frame.
    pub fn send_v1(&mut self, msg: &mut MessageInstance) -> Result<()> {
        self.session.send(msg, &mut self.transport, true)
    }

    /// Feed received bytes and collect every outcome.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<MessageInstance>> {
        self.session.feed(bytes)
    }

    /// Read once from `reader` and feed what arrived. `None` at end of stream.
    pub fn read_from<R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<Vec<Result<MessageInstance>>>> {
        let mut buf = [0u8; READ_CHUNK];
        let n = loop {
            match reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            debug!("Transport reached end of stream");
            return Ok(None);
        }
        Ok(Some(self.session.feed(&buf[..n])))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (Session, T) {
        (self.session, self.transport)
    }
}
