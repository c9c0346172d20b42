//! Pre-header layout: bare pending flag, request count, text.

use phrasebox_types::PersistedState;

use super::chunk::{ByteChunk, ChunkReader};
use super::DecodeError;

pub(super) fn encode(chunk: &mut ByteChunk, state: &PersistedState) {
    chunk.write_bool(state.pending);
    chunk.write_i32(state.request_count.min(i32::MAX as u32) as i32);
    chunk.write_str(&state.text);
}

pub(super) fn decode(reader: &mut ChunkReader<'_>) -> Result<PersistedState, DecodeError> {
    let pending = reader.read_bool()?;
    let request_count = reader.read_i32()?;
    let text = reader.read_string()?;
    Ok(PersistedState {
        pending,
        request_count: request_count.max(0) as u32,
        text,
    })
}
