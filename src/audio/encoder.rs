// Platform chunk encoders
//
// A chunk encoder turns live frames into the capture's native encoding and
// hands out whatever has accumulated each time a chunk is requested. The
// concatenation of all chunks of one pass must be decodable as a whole.

use super::backend::{PcmFrame, StreamFormat};
use super::wav::pcm16_sample;

pub trait ChunkEncoder: Send {
    /// Native encoding type of the produced bytes
    fn mime_type(&self) -> &str;

    /// Encode one frame into the pending chunk
    fn encode(&mut self, frame: &PcmFrame);

    /// Take the pending chunk, if any bytes have accumulated
    fn take_chunk(&mut self) -> Option<Vec<u8>>;
}

/// Creates one encoder per capture pass.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, format: StreamFormat) -> Box<dyn ChunkEncoder>;
}

/// Raw linear PCM, 16-bit big-endian, described by an
/// `audio/L16;rate=<hz>;channels=<n>` MIME type.
pub struct L16Encoder {
    mime_type: String,
    pending: Vec<u8>,
}

impl L16Encoder {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            mime_type: l16_mime_type(format),
            pending: Vec::new(),
        }
    }
}

impl ChunkEncoder for L16Encoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn encode(&mut self, frame: &PcmFrame) {
        self.pending.reserve(frame.samples.len() * 2);
        for &sample in &frame.samples {
            self.pending
                .extend_from_slice(&pcm16_sample(sample).to_be_bytes());
        }
    }

    fn take_chunk(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct L16EncoderFactory;

impl EncoderFactory for L16EncoderFactory {
    fn create(&self, format: StreamFormat) -> Box<dyn ChunkEncoder> {
        Box::new(L16Encoder::new(format))
    }
}

pub fn l16_mime_type(format: StreamFormat) -> String {
    format!(
        "audio/L16;rate={};channels={}",
        format.sample_rate, format.channels
    )
}

/// Parse an `audio/L16` MIME type. Channels default to 1 when omitted.
pub fn parse_l16_mime(mime_type: &str) -> Option<StreamFormat> {
    let mut parts = mime_type.split(';').map(str::trim);
    let essence = parts.next()?;
    if !essence.eq_ignore_ascii_case("audio/l16") {
        return None;
    }

    let mut sample_rate = None;
    let mut channels = 1u16;

    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => sample_rate = value.trim().parse().ok(),
            "channels" => channels = value.trim().parse().ok()?,
            _ => {}
        }
    }

    Some(StreamFormat {
        sample_rate: sample_rate?,
        channels,
    })
}
