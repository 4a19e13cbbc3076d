//! libopus-backed [`Codec`] used for the voice channel.

use crate::{
    constants::{CHANNELS, OPUS_BITRATE, TARGET_SAMPLE_RATE},
    encoder::Codec,
    error::EncodeError,
};
use audiopus::{coder::Encoder, Application, Bitrate, Channels, SampleRate};

pub struct OpusCodec {
    encoder: Encoder,
}

impl OpusCodec {
    /// 48kHz stereo encoder tuned for music at the given bitrate.
    pub fn new(bitrate: i32) -> Result<Self, EncodeError> {
        debug_assert_eq!(TARGET_SAMPLE_RATE, 48000);
        debug_assert_eq!(CHANNELS, 2);

        let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(bitrate))
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Self { encoder })
    }

    pub fn with_default_bitrate() -> Result<Self, EncodeError> {
        Self::new(OPUS_BITRATE)
    }
}

impl Codec for OpusCodec {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, EncodeError> {
        self.encoder
            .encode(pcm, out)
            .map_err(|e| EncodeError::Codec(e.to_string()))
    }
}
