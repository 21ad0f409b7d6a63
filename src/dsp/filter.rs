//! Single-input filter stages. Every function takes a sample buffer and
//! returns a new one; filter state never outlives the call.

use anyhow::{anyhow, Result};
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

/// Keep biquad center frequencies inside the representable band.
fn clamp_freq(freq: f32, sample_rate: u32) -> f32 {
    freq.clamp(1.0, sample_rate as f32 * 0.49)
}

fn run_biquad(samples: &[f32], coeffs: Coefficients<f32>) -> Vec<f32> {
    let mut filter = DirectForm2Transposed::<f32>::new(coeffs);
    samples.iter().map(|&s| filter.run(s)).collect()
}

fn coefficients(
    filter_type: Type<f32>,
    sample_rate: u32,
    freq: f32,
    q: f32,
) -> Result<Coefficients<f32>> {
    Coefficients::<f32>::from_params(
        filter_type,
        (sample_rate as f32).hz(),
        clamp_freq(freq, sample_rate).hz(),
        q,
    )
    .map_err(|e| anyhow!("invalid biquad parameters: {:?}", e))
}

/// Peaking EQ band. `width` is the bandwidth in Hz around `freq`.
pub fn equalizer(
    samples: &[f32],
    sample_rate: u32,
    freq: f32,
    width: f32,
    gain_db: f32,
) -> Result<Vec<f32>> {
    let q = (freq / width.max(1.0)).max(0.1);
    let coeffs = coefficients(Type::PeakingEQ(gain_db), sample_rate, freq, q)?;
    Ok(run_biquad(samples, coeffs))
}

pub fn low_shelf(samples: &[f32], sample_rate: u32, freq: f32, gain_db: f32) -> Result<Vec<f32>> {
    let coeffs = coefficients(Type::LowShelf(gain_db), sample_rate, freq, Q_BUTTERWORTH_F32)?;
    Ok(run_biquad(samples, coeffs))
}

pub fn high_shelf(samples: &[f32], sample_rate: u32, freq: f32, gain_db: f32) -> Result<Vec<f32>> {
    let coeffs = coefficients(Type::HighShelf(gain_db), sample_rate, freq, Q_BUTTERWORTH_F32)?;
    Ok(run_biquad(samples, coeffs))
}

pub fn lowpass(samples: &[f32], sample_rate: u32, cutoff: f32) -> Result<Vec<f32>> {
    let coeffs = coefficients(Type::LowPass, sample_rate, cutoff, Q_BUTTERWORTH_F32)?;
    Ok(run_biquad(samples, coeffs))
}

pub fn highpass(samples: &[f32], sample_rate: u32, cutoff: f32) -> Result<Vec<f32>> {
    let coeffs = coefficients(Type::HighPass, sample_rate, cutoff, Q_BUTTERWORTH_F32)?;
    Ok(run_biquad(samples, coeffs))
}

/// One-pole lowpass. Cheap and artifact-free for noise shaping; `alpha` is
/// the per-sample blend factor (smaller = darker).
pub fn one_pole_lowpass(samples: &[f32], alpha: f32) -> Vec<f32> {
    let mut state = 0.0f32;
    samples
        .iter()
        .map(|&s| {
            state = s * alpha + state * (1.0 - alpha);
            state
        })
        .collect()
}

/// Tape-wow vibrato: a fractional delay line whose length wobbles with a
/// slow sine LFO. `depth` is the fraction of a 10 ms maximum swing.
pub fn vibrato(samples: &[f32], sample_rate: u32, rate_hz: f32, depth: f32) -> Vec<f32> {
    let max_swing = 0.010 * sample_rate as f32;
    let swing = depth.clamp(0.0, 1.0) * max_swing;
    let base_delay = swing + 2.0;

    let mut out = Vec::with_capacity(samples.len());
    for i in 0..samples.len() {
        let phase = 2.0 * std::f32::consts::PI * rate_hz * i as f32 / sample_rate as f32;
        let delay = base_delay + swing * 0.5 * (1.0 + phase.sin());
        let pos = i as f32 - delay;

        if pos < 0.0 {
            out.push(samples[i]);
            continue;
        }
        let idx = pos as usize;
        let frac = pos - idx as f32;
        let a = samples[idx];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

/// Feed-forward echo tap: dry signal at `in_gain` plus one delayed copy at
/// `decay * out_gain`.
pub fn echo(
    samples: &[f32],
    sample_rate: u32,
    delay_ms: f32,
    decay: f32,
    in_gain: f32,
    out_gain: f32,
) -> Vec<f32> {
    let delay = ((delay_ms / 1000.0) * sample_rate as f32) as usize;
    (0..samples.len())
        .map(|i| {
            let wet = if i >= delay { samples[i - delay] * decay } else { 0.0 };
            samples[i] * in_gain + wet * out_gain
        })
        .collect()
}
