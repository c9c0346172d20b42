//! Current layout: magic, version, flags, request count, text.

use phrasebox_types::PersistedState;

use super::chunk::{ByteChunk, ChunkReader};
use super::{DecodeError, FLAG_PLAYBACK_PENDING, STATE_MAGIC, STATE_VERSION};

pub(super) fn encode(chunk: &mut ByteChunk, state: &PersistedState) {
    let flags = if state.pending { FLAG_PLAYBACK_PENDING } else { 0 };
    chunk.write_u32(STATE_MAGIC);
    chunk.write_u32(STATE_VERSION);
    chunk.write_u32(flags);
    chunk.write_i32(state.request_count.min(i32::MAX as u32) as i32);
    chunk.write_str(&state.text);
}

pub(super) fn decode(reader: &mut ChunkReader<'_>) -> Result<PersistedState, DecodeError> {
    let magic = reader.read_u32()?;
    let version = reader.read_u32()?;
    if magic != STATE_MAGIC || version != STATE_VERSION {
        return Err(DecodeError::BadHeader { magic, version });
    }
    let flags = reader.read_u32()?;
    let request_count = reader.read_i32()?;
    let text = reader.read_string()?;
    Ok(PersistedState {
        pending: flags & FLAG_PLAYBACK_PENDING != 0,
        request_count: request_count.max(0) as u32,
        text,
    })
}
