//! Wire framing.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! [4-byte length as u32 big-endian] + [ciphertext]
//! ```
//!
//! There is no per-frame header beyond the length: cipher identity is fixed
//! per channel and never negotiated on the wire. A peer that closes the
//! connection before sending a length prefix is a normal shutdown, reported
//! as `None`; a close in the middle of a frame is a transport error.

use std::io::{Read, Write};

use crate::error::{Result, SealwireError};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Writes one frame, fully: partial writes are not tolerated.
///
/// # Errors
///
/// Returns `Transport`/`Timeout` on write failures, or `Transport` if the
/// payload cannot be represented by the 4-byte length prefix.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8], timeout_secs: u64) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        SealwireError::Transport(format!("frame too large for wire format: {} bytes", payload.len()))
    })?;

    writer
        .write_all(&len.to_be_bytes())
        .map_err(|e| SealwireError::from_io(e, "writing length prefix", timeout_secs))?;
    writer
        .write_all(payload)
        .map_err(|e| SealwireError::from_io(e, "writing frame body", timeout_secs))?;
    writer
        .flush()
        .map_err(|e| SealwireError::from_io(e, "flushing frame", timeout_secs))?;

    Ok(())
}

/// Reads the 4-byte length prefix of the next frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before
/// sending any byte of the prefix — the "no more messages" signal.
///
/// # Errors
///
/// Returns `Transport` when the connection closes mid-prefix, and
/// `Transport`/`Timeout` on other read failures.
pub fn read_len<R: Read>(reader: &mut R, timeout_secs: u64) -> Result<Option<u64>> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;

    while filled < LENGTH_PREFIX_SIZE {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(SealwireError::Transport(
                    "connection closed inside length prefix".to_string(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SealwireError::from_io(e, "reading length prefix", timeout_secs)),
        }
    }

    Ok(Some(u32::from_be_bytes(len_buf) as u64))
}

/// Reads exactly `len` bytes of frame body.
///
/// # Errors
///
/// Returns `Transport` when the connection closes before the body is
/// complete, and `Transport`/`Timeout` on other read failures.
pub fn read_body<R: Read>(reader: &mut R, len: usize, timeout_secs: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SealwireError::Transport("connection closed inside frame body".to_string())
        } else {
            SealwireError::from_io(e, "reading frame body", timeout_secs)
        }
    })?;
    Ok(buf)
}

/// Reads one whole frame, bounding the announced length by `max_len`.
///
/// Returns `Ok(None)` on a clean close before the length prefix.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u64, timeout_secs: u64) -> Result<Option<Vec<u8>>> {
    let len = match read_len(reader, timeout_secs)? {
        Some(len) => len,
        None => return Ok(None),
    };

    if len > max_len {
        return Err(SealwireError::Transport(format!(
            "frame too large: {} bytes (max {} bytes)",
            len, max_len
        )));
    }

    Ok(Some(read_body(reader, len as usize, timeout_secs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        write_frame(&mut wire, payload, 10).unwrap();
        assert_eq!(wire.len(), LENGTH_PREFIX_SIZE + payload.len());

        let mut cursor = Cursor::new(wire);
        read_frame(&mut cursor, u64::MAX, 10).unwrap().unwrap()
    }

    #[test]
    fn test_frame_round_trip_empty() {
        assert_eq!(round_trip(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_frame_round_trip_single_byte() {
        assert_eq!(round_trip(&[0x7F]), vec![0x7F]);
    }

    #[test]
    fn test_frame_round_trip_large() {
        // Larger than a u16 length could describe.
        let payload = vec![0xA5; 70_000];
        assert_eq!(round_trip(&payload), payload);
    }

    #[test]
    fn test_length_prefix_is_big_endian() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &[0u8; 0x0102], 10).unwrap();
        assert_eq!(&wire[..4], &[0x00, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_clean_close_before_prefix() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_frame(&mut cursor, u64::MAX, 10).unwrap().is_none());
    }

    #[test]
    fn test_close_inside_prefix_is_error() {
        let mut cursor = Cursor::new(vec![0x00, 0x00]);
        let result = read_frame(&mut cursor, u64::MAX, 10);
        assert!(matches!(result, Err(SealwireError::Transport(_))));
    }

    #[test]
    fn test_close_inside_body_is_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &[1, 2, 3, 4], 10).unwrap();
        wire.truncate(6); // length says 4 bytes, only 2 present

        let mut cursor = Cursor::new(wire);
        let result = read_frame(&mut cursor, u64::MAX, 10);
        assert!(matches!(result, Err(SealwireError::Transport(_))));
    }

    #[test]
    fn test_oversized_frame_rejected_before_body_read() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &vec![0u8; 100], 10).unwrap();

        let mut cursor = Cursor::new(wire);
        let result = read_frame(&mut cursor, 99, 10);
        assert!(matches!(result, Err(SealwireError::Transport(_))));
    }

    #[test]
    fn test_multiple_frames_in_sequence() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"first", 10).unwrap();
        write_frame(&mut wire, b"second", 10).unwrap();

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor, 1024, 10).unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut cursor, 1024, 10).unwrap().unwrap(), b"second");
        assert!(read_frame(&mut cursor, 1024, 10).unwrap().is_none());
    }
}
