//! Pull-based audio pipeline: pipe bytes in, one encoded 20ms frame out.
//!
//! The pipe delivers bytes in whatever chunk sizes the writer produces, while
//! each tick must consume exactly [`SOURCE_FRAME_BYTES`]. Leftover bytes stay
//! in the frame buffer until the next call.

use crate::{
    constants::{CHANNELS, SOURCE_FRAME_BYTES, SOURCE_SAMPLE_RATE},
    encoder::{EncodedFrame, FrameEncoder},
    error::EncodeError,
    gain::GainStage,
    pcm::PcmChunk,
    pipe::FrameSource,
    resampler::LinearResampler,
};
use bytes::{Bytes, BytesMut};
use std::{fs::File, io::Read};

/// Result of pulling one tick from the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Encoded audio for this tick.
    Frame(EncodedFrame),

    /// The writer closed the pipe. Playback should stop.
    EndOfStream,

    /// This tick's frame could not be produced. Try again on the next tick.
    TransientSkip,
}

pub struct AudioPipeline<R = File> {
    source: Option<FrameSource<R>>,
    buffer: BytesMut,
    resampler: LinearResampler,
    gain: GainStage,
    encoder: FrameEncoder,
    frames_emitted: u64,
}

impl<R> AudioPipeline<R> {
    pub fn new(source: FrameSource<R>, encoder: FrameEncoder, gain: GainStage) -> Self {
        Self {
            source: Some(source),
            buffer: BytesMut::with_capacity(SOURCE_FRAME_BYTES * 2),
            resampler: LinearResampler::default(),
            gain,
            encoder,
            frames_emitted: 0,
        }
    }

    /// Seed the frame buffer, e.g. with the chunk read while probing the pipe.
    pub fn with_initial_chunk(mut self, chunk: &[u8]) -> Self {
        self.buffer.extend_from_slice(chunk);
        self
    }

    /// Release the pipe handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            info!(
                "Pipe closed after {} frames ({} bytes left unplayed)",
                self.frames_emitted,
                self.buffer.len()
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }
}

impl<R: Read> AudioPipeline<R> {
    /// Produce the encoded frame for the next tick.
    ///
    /// Performs at most one blocking pipe read per missing span of bytes.
    pub fn next_frame(&mut self) -> FrameOutcome {
        let Some(source) = self.source.as_mut() else {
            return FrameOutcome::EndOfStream;
        };

        while self.buffer.len() < SOURCE_FRAME_BYTES {
            let shortfall = SOURCE_FRAME_BYTES - self.buffer.len();
            match source.read_chunk(shortfall) {
                Ok(chunk) if chunk.is_empty() => {
                    info!("AirPlay stream ended");
                    self.close();
                    return FrameOutcome::EndOfStream;
                }
                Ok(chunk) => self.buffer.extend_from_slice(&chunk),
                Err(e) => {
                    error!("Error reading audio from pipe: {e}");
                    self.close();
                    return FrameOutcome::EndOfStream;
                }
            }
        }

        // Advance the buffer before transforming so a bad frame is skipped, not retried
        let raw = self.buffer.split_to(SOURCE_FRAME_BYTES).freeze();

        match self.transform(raw) {
            Ok(frame) => {
                self.frames_emitted += 1;
                trace!("Encoded frame {} ({} bytes)", self.frames_emitted, frame.len());
                FrameOutcome::Frame(frame)
            }
            Err(e) => {
                error!("Error encoding audio frame: {e}");
                FrameOutcome::TransientSkip
            }
        }
    }

    fn transform(&mut self, raw: Bytes) -> Result<EncodedFrame, EncodeError> {
        let chunk = PcmChunk::from_le_bytes(SOURCE_SAMPLE_RATE, CHANNELS, &raw).ok_or_else(|| {
            EncodeError::Codec(format!("malformed PCM chunk of {} bytes", raw.len()))
        })?;

        let interpolated = self.resampler.interpolate(&chunk);
        let samples = self.gain.apply(&interpolated);
        let frame = PcmChunk::new(self.resampler.target_rate(), CHANNELS, samples).ok_or(
            EncodeError::FrameLength {
                expected: self.encoder.frame_samples(),
                actual: interpolated.len() / CHANNELS as usize,
            },
        )?;

        self.encoder.encode(&frame)
    }
}

impl<R> Drop for AudioPipeline<R> {
    fn drop(&mut self) {
        self.close();
    }
}
