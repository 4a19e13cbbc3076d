//! Fixed audio format and timing parameters.

use std::time::Duration;

/// Sample rate of the raw PCM written into the pipe by the AirPlay receiver.
pub const SOURCE_SAMPLE_RATE: u32 = 44100;

/// Sample rate expected by the voice channel (Discord native format).
pub const TARGET_SAMPLE_RATE: u32 = 48000;

pub const CHANNELS: u16 = 2; // Stereo
pub const BYTES_PER_SAMPLE: usize = 2; // 16-bit signed little-endian

/// Duration of one playback tick.
pub const FRAME_MS: u32 = 20;

/// Samples per channel in one 20ms frame at the source rate.
pub const SOURCE_FRAME_SAMPLES: usize = (SOURCE_SAMPLE_RATE * FRAME_MS / 1000) as usize;

/// Samples per channel in one 20ms frame at the target rate.
pub const TARGET_FRAME_SAMPLES: usize = (TARGET_SAMPLE_RATE * FRAME_MS / 1000) as usize;

/// Bytes of source PCM consumed per tick.
pub const SOURCE_FRAME_BYTES: usize = SOURCE_FRAME_SAMPLES * CHANNELS as usize * BYTES_PER_SAMPLE;

/// Bytes of target PCM produced per tick (before encoding).
pub const TARGET_FRAME_BYTES: usize = TARGET_FRAME_SAMPLES * CHANNELS as usize * BYTES_PER_SAMPLE;

pub const OPUS_BITRATE: i32 = 510_000;

/// 1.0 leaves the stream untouched, 2.0 doubles the amplitude.
pub const DEFAULT_VOLUME_GAIN: f64 = 2.0;

pub const DEFAULT_PIPE_PATH: &str = "/tmp/airplay-fifo";

pub const PIPE_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const PRESENCE_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);
