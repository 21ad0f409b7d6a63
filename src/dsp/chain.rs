//! An explicit, inspectable processing chain. The orchestrator builds chains
//! as plain values before any audio is rendered, so tests can assert on the
//! planned structure, and applying the same chain to the same signal is
//! reproducible.

use anyhow::Result;

use super::{dynamics, filter};
use crate::audio::signal::AudioSignal;

/// One single-input filter operation. Two-input operations (mixing, sidechain
/// ducking) are free functions in `dsp::dynamics` / `audio::signal`.
#[derive(Clone, Debug, PartialEq)]
pub enum ChainOp {
    Gain(f32),
    Equalizer { freq: f32, width: f32, gain_db: f32 },
    LowShelf { freq: f32, gain_db: f32 },
    HighShelf { freq: f32, gain_db: f32 },
    Lowpass { cutoff: f32 },
    Highpass { cutoff: f32 },
    Vibrato { rate_hz: f32, depth: f32 },
    Compressor { threshold: f32, ratio: f32, attack_ms: f32, release_ms: f32, makeup: f32 },
    Limiter { ceiling: f32, attack_ms: f32, release_ms: f32 },
    Echo { delay_ms: f32, decay: f32, in_gain: f32, out_gain: f32 },
    Normalize { target_rms: f32, max_gain: f32 },
}

/// Ordered list of operations applied to one signal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalChain {
    pub ops: Vec<ChainOp>,
}

impl SignalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gain(mut self, gain: f32) -> Self {
        self.ops.push(ChainOp::Gain(gain));
        self
    }

    pub fn equalizer(mut self, freq: f32, width: f32, gain_db: f32) -> Self {
        self.ops.push(ChainOp::Equalizer { freq, width, gain_db });
        self
    }

    pub fn low_shelf(mut self, freq: f32, gain_db: f32) -> Self {
        self.ops.push(ChainOp::LowShelf { freq, gain_db });
        self
    }

    pub fn high_shelf(mut self, freq: f32, gain_db: f32) -> Self {
        self.ops.push(ChainOp::HighShelf { freq, gain_db });
        self
    }

    pub fn lowpass(mut self, cutoff: f32) -> Self {
        self.ops.push(ChainOp::Lowpass { cutoff });
        self
    }

    pub fn highpass(mut self, cutoff: f32) -> Self {
        self.ops.push(ChainOp::Highpass { cutoff });
        self
    }

    pub fn vibrato(mut self, rate_hz: f32, depth: f32) -> Self {
        self.ops.push(ChainOp::Vibrato { rate_hz, depth });
        self
    }

    pub fn compressor(
        mut self,
        threshold: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
        makeup: f32,
    ) -> Self {
        self.ops.push(ChainOp::Compressor { threshold, ratio, attack_ms, release_ms, makeup });
        self
    }

    pub fn limiter(mut self, ceiling: f32, attack_ms: f32, release_ms: f32) -> Self {
        self.ops.push(ChainOp::Limiter { ceiling, attack_ms, release_ms });
        self
    }

    pub fn echo(mut self, delay_ms: f32, decay: f32, in_gain: f32, out_gain: f32) -> Self {
        self.ops.push(ChainOp::Echo { delay_ms, decay, in_gain, out_gain });
        self
    }

    pub fn normalize(mut self, target_rms: f32, max_gain: f32) -> Self {
        self.ops.push(ChainOp::Normalize { target_rms, max_gain });
        self
    }

    /// Render the chain against a signal. The input is untouched; each op
    /// produces a fresh buffer.
    pub fn apply(&self, input: &AudioSignal) -> Result<AudioSignal> {
        let sr = input.sample_rate;
        let mut samples = input.samples.clone();

        for op in &self.ops {
            samples = match *op {
                ChainOp::Gain(g) => samples.iter().map(|s| s * g).collect(),
                ChainOp::Equalizer { freq, width, gain_db } => {
                    filter::equalizer(&samples, sr, freq, width, gain_db)?
                }
                ChainOp::LowShelf { freq, gain_db } => {
                    filter::low_shelf(&samples, sr, freq, gain_db)?
                }
                ChainOp::HighShelf { freq, gain_db } => {
                    filter::high_shelf(&samples, sr, freq, gain_db)?
                }
                ChainOp::Lowpass { cutoff } => filter::lowpass(&samples, sr, cutoff)?,
                ChainOp::Highpass { cutoff } => filter::highpass(&samples, sr, cutoff)?,
                ChainOp::Vibrato { rate_hz, depth } => {
                    filter::vibrato(&samples, sr, rate_hz, depth)
                }
                ChainOp::Compressor { threshold, ratio, attack_ms, release_ms, makeup } => {
                    dynamics::compress(&samples, sr, threshold, ratio, attack_ms, release_ms, makeup)
                }
                ChainOp::Limiter { ceiling, attack_ms, release_ms } => {
                    dynamics::limit(&samples, sr, ceiling, attack_ms, release_ms)
                }
                ChainOp::Echo { delay_ms, decay, in_gain, out_gain } => {
                    filter::echo(&samples, sr, delay_ms, decay, in_gain, out_gain)
                }
                ChainOp::Normalize { target_rms, max_gain } => {
                    dynamics::normalize_rms(&samples, target_rms, max_gain)
                }
            };
        }

        Ok(AudioSignal::new(samples, sr))
    }
}
