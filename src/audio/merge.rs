// Audio merger for joining capture segments
//
// Decodes every segment of a session and concatenates them back to back in
// capture order. Pause time contributes no samples. Segments with fewer
// channels than the widest one get silent stand-in channels.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::buffer::DecodedBuffer;
use super::decode::AudioDecoder;
use super::segment::Segment;
use crate::error::PreviewError;

pub struct AudioMerger {
    decoder: Arc<dyn AudioDecoder>,
}

impl AudioMerger {
    pub fn new(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode all segments and join them into one buffer
    ///
    /// Any decode failure aborts the whole merge.
    pub async fn merge(&self, segments: &[Segment]) -> Result<DecodedBuffer, PreviewError> {
        if segments.is_empty() {
            return Err(PreviewError::Decode {
                index: 0,
                reason: "no segments to merge".to_string(),
            });
        }

        let decoded = try_join_all(segments.iter().enumerate().map(|(index, segment)| {
            let decoder = Arc::clone(&self.decoder);
            async move {
                decoder
                    .decode(segment)
                    .await
                    .map_err(|e| PreviewError::Decode {
                        index,
                        reason: e.to_string(),
                    })
            }
        }))
        .await?;

        let merged = concatenate(decoded)?;

        info!(
            "Merged {} segments: {} frames, {}Hz, {} channels ({:.2}s)",
            segments.len(),
            merged.frame_count(),
            merged.sample_rate(),
            merged.channel_count(),
            merged.duration_seconds()
        );

        Ok(merged)
    }
}

/// Concatenate decoded buffers sample-accurately
///
/// All inputs must share the first buffer's sample rate.
pub fn concatenate(buffers: Vec<DecodedBuffer>) -> Result<DecodedBuffer, PreviewError> {
    let mut buffers = buffers.into_iter();
    let Some(first) = buffers.next() else {
        return Err(PreviewError::Decode {
            index: 0,
            reason: "no segments to merge".to_string(),
        });
    };

    let rest: Vec<DecodedBuffer> = buffers.collect();
    if rest.is_empty() {
        return Ok(first);
    }

    let sample_rate = first.sample_rate();
    let inputs: Vec<DecodedBuffer> = std::iter::once(first).chain(rest).collect();

    if let Some((index, mismatched)) = inputs
        .iter()
        .enumerate()
        .find(|(_, b)| b.sample_rate() != sample_rate)
    {
        return Err(PreviewError::Decode {
            index,
            reason: format!(
                "sample rate {}Hz does not match {}Hz",
                mismatched.sample_rate(),
                sample_rate
            ),
        });
    }

    let channel_count = inputs.iter().map(DecodedBuffer::channel_count).max().unwrap_or(0);
    let total_frames: usize = inputs.iter().map(DecodedBuffer::frame_count).sum();
    let mut output = DecodedBuffer::silent(sample_rate, channel_count, total_frames);

    let mut offset = 0;
    for input in &inputs {
        let frames = input.frame_count();
        // Channels missing from this input stay zero-filled
        for channel in 0..input.channel_count() {
            output.channel_mut(channel)[offset..offset + frames]
                .copy_from_slice(input.channel(channel));
        }

        debug!(
            "Placed {} frames ({} channels) at frame {}",
            frames,
            input.channel_count(),
            offset
        );
        offset += frames;
    }

    Ok(output)
}
