//! Length-prefixed framing: `| length:u32 BE | payload |`.
//!
//! Mirrors the original implementation's `secure_recv`/`secure_send`: reads
//! and writes loop until the requested number of bytes has moved, and a read
//! that returns zero bytes is retried up to [`MAX_ZERO_READ_RETRIES`] times
//! before the connection is declared dead. A TCP `read` returning 0 normally
//! means EOF, but the non-blocking sockets used by the shard/master control
//! loops can also surface spurious zero-length reads while a peer is mid
//! `connect()`; retrying a bounded number of times absorbs that without
//! hanging forever on a truly closed socket.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Matches the C++ reference client/server's `max_retries` in `read_n`.
pub const MAX_ZERO_READ_RETRIES: u32 = 10_000;

const LENGTH_FIELD_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame length {0} exceeds maximum allowed size")]
    FrameTooLarge(u32),
}

/// Largest payload we will allocate for on a single frame. Guards a
/// corrupted or malicious length field from triggering an unbounded
/// allocation.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

fn read_exact_with_retry<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FramingError> {
    let mut filled = 0usize;
    let mut zero_reads = 0u32;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                zero_reads += 1;
                if zero_reads >= MAX_ZERO_READ_RETRIES {
                    return Err(FramingError::ConnectionClosed);
                }
            }
            Ok(n) => {
                filled += n;
                zero_reads = 0;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FramingError::Io(e)),
        }
    }
    Ok(())
}

/// Reads one length-prefixed frame from `reader`. Returns `Ok(None)` if the
/// peer closed the connection cleanly before sending a length field.
pub fn recv_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError> {
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    match read_exact_with_retry(reader, &mut len_buf) {
        Ok(()) => {}
        Err(FramingError::ConnectionClosed) => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = (&len_buf[..]).read_u32::<BigEndian>()?;
    if len > MAX_FRAME_LEN {
        return Err(FramingError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    read_exact_with_retry(reader, &mut payload)?;
    Ok(Some(payload))
}

/// Writes one length-prefixed frame to `writer`, looping until the whole
/// buffer has been accepted by the socket.
pub fn send_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FramingError> {
    let mut header = Vec::with_capacity(LENGTH_FIELD_SIZE);
    header.write_u32::<BigEndian>(payload.len() as u32)?;
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_frame() {
        let mut buf = Vec::new();
        send_frame(&mut buf, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        let got = recv_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn empty_stream_reports_closed() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let got = recv_frame(&mut cursor).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(MAX_FRAME_LEN + 1).unwrap();
        let mut cursor = Cursor::new(buf);
        let err = recv_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, FramingError::FrameTooLarge(_)));
    }
}
