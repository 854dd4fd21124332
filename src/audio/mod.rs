pub mod backend;
pub mod buffer;
pub mod decode;
pub mod encoder;
pub mod file;
pub mod input;
pub mod merge;
pub mod segment;
pub mod waveform;
pub mod wav;

pub use backend::{
    AudioBackendConfig, MediaDevices, MediaStream, PcmFrame, StreamFormat, StreamHandle,
    StreamSource,
};
pub use buffer::DecodedBuffer;
pub use decode::{AudioDecoder, DecodeError, MediaDecoder};
pub use encoder::{ChunkEncoder, EncoderFactory, L16Encoder, L16EncoderFactory};
pub use file::{AudioFile, FileInput};
pub use input::SignalInput;
pub use merge::AudioMerger;
pub use segment::Segment;
pub use waveform::{extract_peaks, PeakBuffer, PEAKS_PER_SECOND};
pub use wav::{encode_wav, WAV_MIME_TYPE};
