//! Fixed multiplicative gain with saturation to the 16-bit range.

use crate::constants::DEFAULT_VOLUME_GAIN;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainStage {
    gain: f64,
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_GAIN)
    }
}

impl GainStage {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Scale one sample, truncate toward zero and clamp to `[i16::MIN, i16::MAX]`.
    pub fn apply_sample(&self, sample: f64) -> i16 {
        // f64 -> i64 casts saturate, so huge gains cannot wrap before the clamp
        let scaled = (sample * self.gain) as i64;
        scaled.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    pub fn apply(&self, samples: &[f64]) -> Vec<i16> {
        samples.iter().map(|&s| self.apply_sample(s)).collect()
    }
}
