//! Canonical RIFF/WAVE serialization.
//!
//! Always emits the 44-byte PCM header (format code 1, 16 bits per sample)
//! regardless of channel count, followed by interleaved little-endian samples.

use super::buffer::DecodedBuffer;
use crate::error::PreviewError;

pub const WAV_HEADER_LEN: usize = 44;
pub const WAV_MIME_TYPE: &str = "audio/wav";

const BYTES_PER_SAMPLE: u16 = 2;

/// Convert a float sample to signed 16-bit PCM.
///
/// Clamps to [-1, 1], scales negatives by 32768 and positives by 32767,
/// then truncates toward zero.
pub fn pcm16_sample(value: f32) -> i16 {
    let value = value.clamp(-1.0, 1.0);
    if value < 0.0 {
        (value * 32768.0) as i16
    } else {
        (value * 32767.0) as i16
    }
}

/// Serialize a decoded buffer into a 16-bit PCM WAV file.
pub fn encode_wav(buffer: &DecodedBuffer) -> Result<Vec<u8>, PreviewError> {
    let frames = buffer.frame_count();
    let channel_count = buffer.channel_count();

    if channel_count == 0 || frames == 0 {
        return Err(PreviewError::Encode(format!(
            "cannot encode empty buffer ({} channels, {} frames)",
            channel_count, frames
        )));
    }

    let channels = u16::try_from(channel_count)
        .map_err(|_| PreviewError::Encode(format!("too many channels: {}", channel_count)))?;
    let block_align = channels
        .checked_mul(BYTES_PER_SAMPLE)
        .ok_or_else(|| PreviewError::Encode(format!("too many channels: {}", channels)))?;
    let byte_rate = buffer
        .sample_rate()
        .checked_mul(block_align as u32)
        .ok_or_else(|| PreviewError::Encode("byte rate exceeds 32 bits".to_string()))?;
    let data_len = (frames as u64) * block_align as u64;
    let riff_len = u32::try_from(36 + data_len)
        .map_err(|_| PreviewError::Encode(format!("{} bytes exceeds RIFF limit", data_len)))?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());

    let planes: Vec<&[f32]> = buffer.channels().collect();
    for frame in 0..frames {
        for plane in &planes {
            out.extend_from_slice(&pcm16_sample(plane[frame]).to_le_bytes());
        }
    }

    Ok(out)
}
