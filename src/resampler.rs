//! Linear-interpolation resampler for the fixed 44.1kHz -> 48kHz conversion.
//!
//! Every chunk is resampled on its own: the output phase restarts at zero for
//! each chunk and no state is carried between calls.

use crate::{
    constants::{SOURCE_SAMPLE_RATE, TARGET_SAMPLE_RATE},
    pcm::PcmChunk,
};

#[derive(Clone, Copy, Debug)]
pub struct LinearResampler {
    target_rate: u32,
    ratio: f64,
}

impl Default for LinearResampler {
    fn default() -> Self {
        Self::new(SOURCE_SAMPLE_RATE, TARGET_SAMPLE_RATE)
    }
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        Self {
            target_rate,
            ratio: target_rate as f64 / source_rate as f64,
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Samples per channel produced for an input of `input_frames` samples per channel.
    pub fn output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f64 * self.ratio) as usize
    }

    /// Interpolated output samples, interleaved, before any gain or rounding.
    pub fn interpolate(&self, input: &PcmChunk) -> Vec<f64> {
        let channels = input.channels() as usize;
        let in_frames = input.frames();
        let out_frames = self.output_frames(in_frames);
        let samples = input.samples();

        if in_frames == 0 {
            return vec![];
        }

        let mut out = Vec::with_capacity(out_frames * channels);

        for i in 0..out_frames {
            let src = i as f64 / self.ratio;
            let idx = src as usize;
            let frac = src - idx as f64;

            for ch in 0..channels {
                let current = samples[idx * channels + ch] as f64;
                let value = if idx + 1 < in_frames {
                    let next = samples[(idx + 1) * channels + ch] as f64;
                    current * (1.0 - frac) + next * frac
                } else {
                    // No extrapolation past the last input sample
                    current
                };
                out.push(value);
            }
        }

        out
    }

    /// Resample at unity gain, truncating the interpolated values.
    pub fn resample(&self, input: &PcmChunk) -> PcmChunk {
        let samples = self
            .interpolate(input)
            .into_iter()
            .map(|s| s as i16)
            .collect();

        PcmChunk::from_whole_frames(self.target_rate, input.channels(), samples)
    }
}
