//! Session state chunk.
//!
//! A chunk is an optional phrase block followed by the host parameter block
//! (one `f64` per parameter). The phrase block is written in the versioned
//! layout; on read the versioned layout is tried first, then the legacy
//! layout at the same offset, and if neither fits the block is treated as
//! absent and parameters are read from the start offset instead.

mod chunk;
mod legacy;
mod versioned;

pub use chunk::{ByteChunk, ChunkReader};

use std::fmt;

use phrasebox_types::PersistedState;

/// "SAMS"
pub const STATE_MAGIC: u32 = 0x5341_4D53;
pub const STATE_VERSION: u32 = 1;
pub const FLAG_PLAYBACK_PENDING: u32 = 1 << 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Truncated { needed: usize, available: usize },
    InvalidBool(u8),
    NegativeLength(i32),
    InvalidUtf8,
    BadHeader { magic: u32, version: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => {
                write!(f, "truncated: needed {} bytes, {} available", needed, available)
            }
            DecodeError::InvalidBool(b) => write!(f, "invalid bool byte {:#04x}", b),
            DecodeError::NegativeLength(n) => write!(f, "negative string length {}", n),
            DecodeError::InvalidUtf8 => write!(f, "text is not valid UTF-8"),
            DecodeError::BadHeader { magic, version } => {
                write!(f, "unknown header magic {:#010x} version {}", magic, version)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Which phrase block layout a chunk was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    Versioned,
    Legacy,
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedState {
    /// `None` when no phrase block layout matched.
    pub state: Option<PersistedState>,
    pub format: StateFormat,
    /// `None` when the parameter block failed to decode.
    pub params: Option<Vec<f64>>,
    /// Offset just past the last byte consumed.
    pub end: usize,
}

/// Encode `state` in the versioned layout followed by `params`.
pub fn encode_state(state: &PersistedState, params: &[f64]) -> Vec<u8> {
    let mut chunk = ByteChunk::new();
    versioned::encode(&mut chunk, state);
    write_params(&mut chunk, params);
    chunk.into_bytes()
}

/// Encode `state` in the legacy layout followed by `params`. Kept for
/// producing fixtures of chunks saved by older builds.
pub fn encode_legacy_state(state: &PersistedState, params: &[f64]) -> Vec<u8> {
    let mut chunk = ByteChunk::new();
    legacy::encode(&mut chunk, state);
    write_params(&mut chunk, params);
    chunk.into_bytes()
}

fn write_params(chunk: &mut ByteChunk, params: &[f64]) {
    for &v in params {
        chunk.write_f64(v);
    }
}

/// Decode a chunk starting at `start`. Never fails: layouts that don't match
/// are reported through `format` and `params`.
pub fn decode_state(bytes: &[u8], start: usize, param_count: usize) -> DecodedState {
    let (state, format, params_at) = decode_phrase_block(bytes, start);

    let mut reader = ChunkReader::new(bytes, params_at);
    let params = match read_params(&mut reader, param_count) {
        Ok(values) => Some(values),
        Err(e) => {
            log::warn!(target: "codec", "parameter block at offset {} unreadable: {}", params_at, e);
            None
        }
    };
    let end = if params.is_some() {
        reader.position()
    } else {
        params_at
    };

    DecodedState {
        state,
        format,
        params,
        end,
    }
}

fn decode_phrase_block(bytes: &[u8], start: usize) -> (Option<PersistedState>, StateFormat, usize) {
    let mut reader = ChunkReader::new(bytes, start);
    let versioned_err = match versioned::decode(&mut reader) {
        Ok(state) => return (Some(state), StateFormat::Versioned, reader.position()),
        Err(e) => e,
    };
    log::debug!(target: "codec", "versioned layout rejected: {}", versioned_err);

    let mut reader = ChunkReader::new(bytes, start);
    match legacy::decode(&mut reader) {
        Ok(state) => {
            log::info!(target: "codec", "decoded legacy state layout");
            (Some(state), StateFormat::Legacy, reader.position())
        }
        Err(e) => {
            log::warn!(target: "codec", "no known state layout at offset {}: {}", start, e);
            (None, StateFormat::Absent, start)
        }
    }
}

fn read_params(reader: &mut ChunkReader<'_>, count: usize) -> Result<Vec<f64>, DecodeError> {
    (0..count).map(|_| reader.read_f64()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pending: bool, request_count: u32, text: &str) -> PersistedState {
        PersistedState {
            pending,
            request_count,
            text: text.to_string(),
        }
    }

    #[test]
    fn versioned_header_layout() {
        let bytes = encode_state(&state(true, 3, "HI"), &[]);
        assert_eq!(&bytes[0..4], &STATE_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &STATE_VERSION.to_le_bytes());
        assert_eq!(&bytes[8..12], &FLAG_PLAYBACK_PENDING.to_le_bytes());
        assert_eq!(&bytes[12..16], &3i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &2i32.to_le_bytes());
        assert_eq!(&bytes[20..], b"HI");
    }

    #[test]
    fn versioned_round_trip_with_params() {
        let s = state(true, 7, "HELLO THERE");
        let bytes = encode_state(&s, &[100.0, 72.0, 64.0, 128.0, 128.0]);
        let decoded = decode_state(&bytes, 0, 5);
        assert_eq!(decoded.format, StateFormat::Versioned);
        assert_eq!(decoded.state, Some(s));
        assert_eq!(decoded.params, Some(vec![100.0, 72.0, 64.0, 128.0, 128.0]));
        assert_eq!(decoded.end, bytes.len());
    }

    #[test]
    fn legacy_layout_decodes_to_same_state() {
        let s = state(false, 12, "OLD SESSION");
        let bytes = encode_legacy_state(&s, &[50.0]);
        let decoded = decode_state(&bytes, 0, 1);
        assert_eq!(decoded.format, StateFormat::Legacy);
        assert_eq!(decoded.state, Some(s));
        assert_eq!(decoded.params, Some(vec![50.0]));
    }

    #[test]
    fn decoding_honours_start_offset() {
        let mut bytes = vec![0xAA; 3];
        bytes.extend(encode_state(&state(false, 1, "X"), &[1.0]));
        let decoded = decode_state(&bytes, 3, 1);
        assert_eq!(decoded.format, StateFormat::Versioned);
        assert_eq!(decoded.end, bytes.len());
    }

    #[test]
    fn unknown_version_falls_through_to_legacy_then_absent() {
        let mut bytes = encode_state(&state(false, 1, "X"), &[]);
        bytes[4] = 9;
        let decoded = decode_state(&bytes, 0, 0);
        // The magic's first byte is not a valid legacy bool either.
        assert_eq!(decoded.format, StateFormat::Absent);
        assert_eq!(decoded.state, None);
        assert_eq!(decoded.end, 0);
    }

    #[test]
    fn params_only_chunk_is_read_from_start() {
        let mut chunk = ByteChunk::new();
        chunk.write_f64(150.0);
        let bytes = chunk.into_bytes();
        // 150.0 starts with a zero byte, which the legacy bool accepts, but the
        // chunk is too short for the rest of the legacy record.
        let decoded = decode_state(&bytes, 0, 1);
        assert_eq!(decoded.format, StateFormat::Absent);
        assert_eq!(decoded.params, Some(vec![150.0]));
        assert_eq!(decoded.end, 8);
    }

    #[test]
    fn garbage_yields_nothing() {
        let decoded = decode_state(&[0xFF, 0x13, 0x37], 0, 5);
        assert_eq!(decoded.state, None);
        assert_eq!(decoded.params, None);
        assert_eq!(decoded.end, 0);
    }

    #[test]
    fn negative_request_count_reads_as_zero() {
        let mut chunk = ByteChunk::new();
        chunk.write_bool(true);
        chunk.write_i32(-4);
        chunk.write_str("NEG");
        let decoded = decode_state(&chunk.into_bytes(), 0, 0);
        assert_eq!(decoded.state, Some(state(true, 0, "NEG")));
    }

    #[test]
    fn oversized_request_count_is_clamped_on_write() {
        let bytes = encode_state(&state(false, u32::MAX, ""), &[]);
        let decoded = decode_state(&bytes, 0, 0);
        assert_eq!(decoded.state.map(|s| s.request_count), Some(i32::MAX as u32));
    }
}
