//! Frame-level wrapper around the audio codec.

use crate::{
    constants::{CHANNELS, TARGET_FRAME_SAMPLES},
    error::EncodeError,
    pcm::PcmChunk,
};
use bytes::Bytes;
use std::sync::Mutex;

/// Largest packet a codec may emit for one frame.
pub const MAX_PACKET_SIZE: usize = 4000;

/// Encoding capability provided by an external codec library.
///
/// Implementations receive exactly one frame of interleaved samples and write
/// the encoded packet into `out`, returning its length.
pub trait Codec: Send {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, EncodeError>;
}

/// Encoded bytes for one 20ms tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame(Bytes);

impl EncodedFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct FrameEncoder {
    // Mutex makes the encoder Sync for the voice driver; it is never contended
    codec: Mutex<Box<dyn Codec>>,
    frame_samples: usize,
    channels: u16,
    packet: Vec<u8>,
}

impl FrameEncoder {
    /// Encoder for 20ms stereo frames at the target rate.
    pub fn new(codec: Box<dyn Codec>) -> Self {
        Self::with_frame_shape(codec, TARGET_FRAME_SAMPLES, CHANNELS)
    }

    pub fn with_frame_shape(codec: Box<dyn Codec>, frame_samples: usize, channels: u16) -> Self {
        Self {
            codec: Mutex::new(codec),
            frame_samples,
            channels,
            packet: vec![0; MAX_PACKET_SIZE],
        }
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    pub fn encode(&mut self, frame: &PcmChunk) -> Result<EncodedFrame, EncodeError> {
        if frame.channels() != self.channels || frame.frames() != self.frame_samples {
            return Err(EncodeError::FrameLength {
                expected: self.frame_samples,
                actual: frame.samples().len() / self.channels.max(1) as usize,
            });
        }

        let codec = self
            .codec
            .get_mut()
            .map_err(|_| EncodeError::Codec("codec state poisoned".to_string()))?;
        let len = codec.encode(frame.samples(), &mut self.packet)?;
        if len > self.packet.len() {
            return Err(EncodeError::Codec(format!(
                "codec reported {len} bytes for a {} byte packet buffer",
                self.packet.len()
            )));
        }

        Ok(EncodedFrame::new(Bytes::copy_from_slice(&self.packet[..len])))
    }
}
