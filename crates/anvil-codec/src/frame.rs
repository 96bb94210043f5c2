//! Length-prefixed framing, generalized from the teacher's session-hub
//! packet shape (`len: u32 BE ∥ body`) to frame arbitrary byte payloads —
//! used by the coordinator/worker wire protocol (§6) and by checkpoint
//! files read incrementally.

use crate::envelope::CodecError;

/// A single length-prefixed frame: 4-byte big-endian length, then that
/// many bytes of body.
pub struct Frame;

impl Frame {
    /// Encode `body` as a length-prefixed frame.
    #[must_use]
    pub fn encode(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + body.len());
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Decode a single frame from the head of `stream`, returning the body
    /// and the number of bytes consumed (header + body). Returns
    /// `Ok(None)` if `stream` does not yet contain a complete frame —
    /// callers reading from a socket should buffer and retry, not treat
    /// this as an error.
    pub fn decode(stream: &[u8]) -> Result<Option<(&[u8], usize)>, CodecError> {
        if stream.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([stream[0], stream[1], stream[2], stream[3]]) as usize;
        if stream.len() < 4 + len {
            return Ok(None);
        }
        Ok(Some((&stream[4..4 + len], 4 + len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_body() {
        let body = b"hello frame";
        let encoded = Frame::encode(body);
        let (decoded, consumed) = Frame::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, body);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn incomplete_frame_is_not_an_error() {
        let body = b"hello frame";
        let mut encoded = Frame::encode(body);
        encoded.truncate(encoded.len() - 1);
        assert!(Frame::decode(&encoded).unwrap().is_none());
    }

    #[test]
    fn two_frames_back_to_back_decode_independently() {
        let mut stream = Frame::encode(b"first");
        stream.extend_from_slice(&Frame::encode(b"second"));
        let (first, consumed1) = Frame::decode(&stream).unwrap().unwrap();
        assert_eq!(first, b"first");
        let (second, _consumed2) = Frame::decode(&stream[consumed1..]).unwrap().unwrap();
        assert_eq!(second, b"second");
    }
}
