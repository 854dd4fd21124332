use async_trait::async_trait;
use std::io::{Cursor, ErrorKind};
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::StreamFormat;
use super::buffer::DecodedBuffer;
use super::encoder::parse_l16_mime;
use super::segment::Segment;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Wrapper around errors produced by the Symphonia decoding library.
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("malformed linear PCM: {0}")]
    Malformed(String),

    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// Audio decode primitive
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, segment: &Segment) -> Result<DecodedBuffer, DecodeError>;
}

/// Decodes raw `audio/L16` directly and everything else through Symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaDecoder;

#[async_trait]
impl AudioDecoder for MediaDecoder {
    async fn decode(&self, segment: &Segment) -> Result<DecodedBuffer, DecodeError> {
        if let Some(format) = parse_l16_mime(segment.mime_type()) {
            return decode_l16(segment.data(), format);
        }

        let data = segment.shared_data();
        let mime_type = segment.mime_type().to_string();

        tokio::task::spawn_blocking(move || decode_container(data, &mime_type))
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))?
    }
}

/// Decode big-endian 16-bit interleaved PCM.
pub fn decode_l16(data: &[u8], format: StreamFormat) -> Result<DecodedBuffer, DecodeError> {
    let channels = format.channels as usize;
    let frame_bytes = channels * 2;

    if format.sample_rate == 0 || channels == 0 {
        return Err(DecodeError::Malformed(format!(
            "invalid format {}Hz, {} channels",
            format.sample_rate, format.channels
        )));
    }
    if data.is_empty() {
        return Err(DecodeError::Malformed("no sample data".to_string()));
    }
    if data.len() % frame_bytes != 0 {
        return Err(DecodeError::Malformed(format!(
            "{} bytes is not a whole number of {}-byte frames",
            data.len(),
            frame_bytes
        )));
    }

    let samples: Vec<f32> = data
        .chunks_exact(2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    Ok(DecodedBuffer::from_interleaved(
        format.sample_rate,
        channels,
        &samples,
    ))
}

/// Decode a container format (WAV, OGG, FLAC, MP3, M4A, ...) from memory.
pub fn decode_container(data: Arc<[u8]>, mime_type: &str) -> Result<DecodedBuffer, DecodeError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(essence) = mime_type.split(';').next() {
        hint.mime_type(essence.trim());
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!("Skipping undecodable packet: {}", reason);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channel_count = spec.channels.count();

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(samples.samples());
    }

    if interleaved.is_empty() || channel_count == 0 {
        return Err(DecodeError::Malformed(format!(
            "{} contained no audio",
            mime_type
        )));
    }

    debug!(
        "Decoded {} samples ({}Hz, {} channels) from {}",
        interleaved.len(),
        sample_rate,
        channel_count,
        mime_type
    );

    Ok(DecodedBuffer::from_interleaved(
        sample_rate,
        channel_count,
        &interleaved,
    ))
}
