//! DCA1 framing for pre-encoded Opus frames.
//!
//! The voice driver recognises a DCA stream by its magic bytes and passes the
//! contained Opus packets straight through instead of decoding and
//! re-encoding them. Layout: `DCA1`, an `i32` LE metadata length, the JSON
//! metadata, then for every frame an `i16` LE length followed by the packet.

use crate::{
    constants::{CHANNELS, OPUS_BITRATE, TARGET_FRAME_SAMPLES, TARGET_SAMPLE_RATE},
    pipeline::{AudioPipeline, FrameOutcome},
};
use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use std::{fs::File, io::Read};

pub const DCA_MAGIC: &[u8; 4] = b"DCA1";

/// Opus packet decoding to 20ms of silence, sent on ticks that produced no audio.
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

#[derive(Serialize)]
struct DcaMetadata {
    dca: DcaInfo,
    opus: OpusInfo,
    info: Option<()>,
    origin: Option<()>,
    extra: Option<()>,
}

#[derive(Serialize)]
struct DcaInfo {
    version: u64,
    tool: Tool,
}

#[derive(Serialize)]
struct Tool {
    name: String,
    version: String,
    url: Option<String>,
    author: Option<String>,
}

#[derive(Serialize)]
struct OpusInfo {
    mode: String,
    sample_rate: u32,
    frame_size: u64,
    abr: Option<u64>,
    vbr: bool,
    channels: u8,
}

/// Build the `DCA1` magic, metadata length and metadata block.
pub fn header(bitrate: i32) -> Vec<u8> {
    let metadata = DcaMetadata {
        dca: DcaInfo {
            version: 1,
            tool: Tool {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                url: None,
                author: None,
            },
        },
        opus: OpusInfo {
            mode: "music".to_string(),
            sample_rate: TARGET_SAMPLE_RATE,
            frame_size: TARGET_FRAME_SAMPLES as u64,
            abr: u64::try_from(bitrate).ok(),
            vbr: true,
            channels: CHANNELS as u8,
        },
        info: None,
        origin: None,
        extra: None,
    };

    // Serializing plain structs cannot fail
    let json = serde_json::to_vec(&metadata).unwrap_or_default();

    let mut header = Vec::with_capacity(DCA_MAGIC.len() + 4 + json.len());
    header.extend_from_slice(DCA_MAGIC);
    header.put_i32_le(json.len() as i32);
    header.extend_from_slice(&json);
    header
}

/// Byte stream view of an [`AudioPipeline`], pulled one frame per refill.
pub struct DcaStream<R = File> {
    pipeline: AudioPipeline<R>,
    pending: BytesMut,
    finished: bool,
    skipped: u64,
}

impl<R: Read> DcaStream<R> {
    pub fn new(pipeline: AudioPipeline<R>) -> Self {
        Self::with_bitrate(pipeline, OPUS_BITRATE)
    }

    pub fn with_bitrate(pipeline: AudioPipeline<R>, bitrate: i32) -> Self {
        let mut pending = BytesMut::new();
        pending.extend_from_slice(&header(bitrate));

        Self {
            pipeline,
            pending,
            finished: false,
            skipped: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    /// Ticks that were filled with silence because encoding failed.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped
    }

    fn refill(&mut self) {
        match self.pipeline.next_frame() {
            FrameOutcome::Frame(frame) => {
                self.pending.put_i16_le(frame.len() as i16);
                self.pending.extend_from_slice(frame.as_bytes());
            }
            FrameOutcome::TransientSkip => {
                self.skipped += 1;
                self.pending.put_i16_le(OPUS_SILENCE_FRAME.len() as i16);
                self.pending.extend_from_slice(&OPUS_SILENCE_FRAME);
            }
            FrameOutcome::EndOfStream => {
                self.finished = true;
                self.pipeline.close();
            }
        }
    }
}

impl<R: Read> Read for DcaStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() && !self.finished {
            self.refill();
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);

        Ok(n)
    }
}

#[cfg(feature = "discord")]
mod media_source {
    use super::DcaStream;
    use std::io::{Read, Seek, SeekFrom};
    use symphonia::core::io::MediaSource;

    impl<R: Read> Seek for DcaStream<R> {
        fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
            // Live audio source doesn't support seeking
            Ok(0)
        }
    }

    impl<R: Read + Send + Sync> MediaSource for DcaStream<R> {
        fn is_seekable(&self) -> bool {
            false
        }

        fn byte_len(&self) -> Option<u64> {
            None
        }
    }
}
