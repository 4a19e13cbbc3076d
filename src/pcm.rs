//! Interleaved 16-bit PCM chunks.

use crate::constants::BYTES_PER_SAMPLE;
use byteorder::{ByteOrder, LittleEndian};

/// A block of interleaved signed 16-bit samples at a known rate.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmChunk {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl PcmChunk {
    /// Build a chunk from interleaved samples.
    ///
    /// Returns `None` when the sample count does not split evenly across
    /// `channels`, since such a chunk would violate the whole-frame invariant.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Option<Self> {
        if channels == 0 || samples.len() % channels as usize != 0 {
            return None;
        }

        Some(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Build a chunk whose sample count is already known to be a multiple of `channels`.
    pub(crate) fn from_whole_frames(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        debug_assert_eq!(samples.len() % channels as usize, 0);
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Decode little-endian bytes as read from the pipe.
    pub fn from_le_bytes(sample_rate: u32, channels: u16, bytes: &[u8]) -> Option<Self> {
        if channels == 0 || bytes.len() % (channels as usize * BYTES_PER_SAMPLE) != 0 {
            return None;
        }

        let mut samples = vec![0i16; bytes.len() / BYTES_PER_SAMPLE];
        LittleEndian::read_i16_into(bytes, &mut samples);

        Self::new(sample_rate, channels, samples)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.byte_len()];
        LittleEndian::write_i16_into(&self.samples, &mut bytes);
        bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples in each channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * BYTES_PER_SAMPLE
    }
}
