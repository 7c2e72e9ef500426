//! WebSocket frame codec.
//!
//! Just enough of RFC 6455 for a publishing client: masked text frames out,
//! text/close frames (with fragmentation) in. Client-to-server frames are
//! always masked; server frames may or may not be.

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

pub const OP_CONTINUATION: u8 = 0x0;
pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xa;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;

/// Upper bound on a single message; anything larger is a protocol error
/// rather than an allocation.
const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// Encode one complete frame. `mask` of `None` sends an unmasked
/// (server-style) frame; clients must always pass a mask.
pub fn encode_frame(opcode: u8, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 14);
    out.push(FIN_BIT | opcode);

    let mask_flag = if mask.is_some() { MASK_BIT } else { 0 };
    // 7-bit, 16-bit, or 64-bit length encoding per the 126/65536 thresholds.
    if len < 126 {
        out.push(mask_flag | len as u8);
    } else if len < 65536 {
        out.push(mask_flag | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_flag | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(
                payload
                    .iter()
                    .enumerate()
                    .map(|(i, b)| b ^ key[i % 4]),
            );
        }
        None => out.extend_from_slice(payload),
    }
    out
}

/// Encode a final text frame with four fresh random mask bytes.
pub fn encode_text(payload: &[u8]) -> Vec<u8> {
    let mut key = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut key);
    encode_frame(OP_TEXT, payload, Some(key))
}

/// Read and decode a single frame from the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    let fin = header[0] & FIN_BIT != 0;
    let opcode = header[0] & 0x0f;
    let masked = header[1] & MASK_BIT != 0;

    let len = match header[1] & 0x7f {
        126 => {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await?;
            u16::from_be_bytes(ext) as u64
        }
        127 => {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext).await?;
            u64::from_be_bytes(ext)
        }
        n => n as u64,
    };
    if len > MAX_PAYLOAD as u64 {
        return Err(Error::Protocol(format!("frame of {len} bytes exceeds cap")));
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Frame { fin, opcode, payload })
}

/// Read frames until one complete text message is assembled.
///
/// Continuation frames are stitched together until FIN; binary messages and
/// stray control frames are discarded. Returns `None` when the peer closes.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    loop {
        let first = read_frame(reader).await?;
        match first.opcode {
            OP_CLOSE => return Ok(None),
            OP_TEXT => {
                let mut buf = first.payload;
                let mut fin = first.fin;
                while !fin {
                    let next = read_frame(reader).await?;
                    match next.opcode {
                        OP_CONTINUATION => {
                            buf.extend_from_slice(&next.payload);
                            if buf.len() > MAX_PAYLOAD {
                                return Err(Error::Protocol(
                                    "fragmented message exceeds cap".into(),
                                ));
                            }
                            fin = next.fin;
                        }
                        OP_PING | OP_PONG => {}
                        OP_CLOSE => return Ok(None),
                        other => {
                            return Err(Error::Protocol(format!(
                                "unexpected opcode {other:#x} inside fragmented message"
                            )))
                        }
                    }
                }
                let text = String::from_utf8(buf)
                    .map_err(|e| Error::Protocol(format!("text frame is not UTF-8: {e}")))?;
                return Ok(Some(text));
            }
            // Binary payloads and unsolicited control frames are not replies.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn round_trip(len: usize) -> Frame {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let encoded = encode_text(&payload);
        let mut cursor = encoded.as_slice();
        let frame = read_frame(&mut cursor).await.unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, OP_TEXT);
        assert_eq!(frame.payload, payload);
        frame
    }

    #[tokio::test]
    async fn round_trips_short_frame() {
        round_trip(10).await;
    }

    #[tokio::test]
    async fn round_trips_sixteen_bit_length() {
        round_trip(200).await;
    }

    #[tokio::test]
    async fn round_trips_sixty_four_bit_length() {
        round_trip(70_000).await;
    }

    #[test]
    fn length_encodings_pick_correct_branch() {
        let short = encode_frame(OP_TEXT, &[0u8; 10], None);
        assert_eq!(short[1] & 0x7f, 10);
        let medium = encode_frame(OP_TEXT, &[0u8; 200], None);
        assert_eq!(medium[1] & 0x7f, 126);
        assert_eq!(u16::from_be_bytes([medium[2], medium[3]]), 200);
        let long = encode_frame(OP_TEXT, &[0u8; 70_000], None);
        assert_eq!(long[1] & 0x7f, 127);
        let mut ext = [0u8; 8];
        ext.copy_from_slice(&long[2..10]);
        assert_eq!(u64::from_be_bytes(ext), 70_000);
    }

    #[test]
    fn masked_frame_differs_from_plaintext() {
        let payload = b"the quick brown fox jumps over the lazy dog";
        let encoded = encode_frame(OP_TEXT, payload, Some([0xa5, 0x3c, 0x7e, 0x01]));
        assert_eq!(encoded[1] & MASK_BIT, MASK_BIT);
        assert_ne!(&encoded[6..], payload.as_slice());
    }

    #[tokio::test]
    async fn client_frames_always_carry_the_mask_bit() {
        let encoded = encode_text(b"hello relay");
        assert_eq!(encoded[1] & MASK_BIT, MASK_BIT);
        let mut cursor = encoded.as_slice();
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.payload, b"hello relay");
    }

    #[tokio::test]
    async fn reads_unmasked_server_frame() {
        let encoded = encode_frame(OP_TEXT, b"[\"OK\"]", None);
        let mut cursor = encoded.as_slice();
        let msg = read_message(&mut cursor).await.unwrap();
        assert_eq!(msg.as_deref(), Some("[\"OK\"]"));
    }

    #[tokio::test]
    async fn reassembles_fragmented_text() {
        let mut stream = Vec::new();
        let mut first = encode_frame(OP_TEXT, b"hel", None);
        first[0] &= !FIN_BIT;
        stream.extend(first);
        let mut middle = encode_frame(OP_CONTINUATION, b"lo ", None);
        middle[0] &= !FIN_BIT;
        stream.extend(middle);
        stream.extend(encode_frame(OP_CONTINUATION, b"relay", None));
        let mut cursor = stream.as_slice();
        let msg = read_message(&mut cursor).await.unwrap();
        assert_eq!(msg.as_deref(), Some("hello relay"));
    }

    #[tokio::test]
    async fn skips_non_text_frames() {
        let mut stream = Vec::new();
        stream.extend(encode_frame(OP_BINARY, &[1, 2, 3], None));
        stream.extend(encode_frame(OP_PING, b"", None));
        stream.extend(encode_frame(OP_TEXT, b"after noise", None));
        let mut cursor = stream.as_slice();
        let msg = read_message(&mut cursor).await.unwrap();
        assert_eq!(msg.as_deref(), Some("after noise"));
    }

    #[tokio::test]
    async fn close_frame_ends_the_stream() {
        let stream = encode_frame(OP_CLOSE, &[], None);
        let mut cursor = stream.as_slice();
        assert_eq!(read_message(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_declared_length_is_a_protocol_error() {
        let mut stream = vec![FIN_BIT | OP_TEXT, 127];
        stream.extend_from_slice(&(u64::MAX).to_be_bytes());
        let mut cursor = stream.as_slice();
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn truncated_frame_is_a_transport_error() {
        let encoded = encode_frame(OP_TEXT, b"cut off", None);
        let mut cursor = &encoded[..4];
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(Error::Transport(_))
        ));
    }
}
