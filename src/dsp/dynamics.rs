//! Dynamics processing: compression, limiting, loudness normalization and
//! the two-input sidechain duck.

use crate::audio::signal::AudioSignal;

fn time_coef(ms: f32, sample_rate: u32) -> f32 {
    let samples = (ms / 1000.0) * sample_rate as f32;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

/// Peak envelope follower with separate attack and release time constants.
struct EnvelopeFollower {
    attack_coef: f32,
    release_coef: f32,
    envelope: f32,
}

impl EnvelopeFollower {
    fn new(attack_ms: f32, release_ms: f32, sample_rate: u32) -> Self {
        Self {
            attack_coef: time_coef(attack_ms, sample_rate),
            release_coef: time_coef(release_ms, sample_rate),
            envelope: 0.0,
        }
    }

    fn next(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;
        self.envelope
    }
}

/// Downward compressor with a linear threshold, matching the knob ranges of
/// the mixing chain (threshold 0..1, ratio >= 1, makeup as a gain factor).
pub fn compress(
    samples: &[f32],
    sample_rate: u32,
    threshold: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup: f32,
) -> Vec<f32> {
    let mut follower = EnvelopeFollower::new(attack_ms, release_ms, sample_rate);
    samples
        .iter()
        .map(|&s| {
            let env = follower.next(s);
            let gain = if env > threshold {
                (threshold + (env - threshold) / ratio) / env
            } else {
                1.0
            };
            s * gain * makeup
        })
        .collect()
}

/// Hard output limiter: gain rides down fast when the envelope exceeds the
/// ceiling, and the output is clamped so nothing escapes it.
pub fn limit(
    samples: &[f32],
    sample_rate: u32,
    ceiling: f32,
    attack_ms: f32,
    release_ms: f32,
) -> Vec<f32> {
    let mut follower = EnvelopeFollower::new(attack_ms, release_ms, sample_rate);
    samples
        .iter()
        .map(|&s| {
            let env = follower.next(s);
            let gain = if env > ceiling { ceiling / env } else { 1.0 };
            (s * gain).clamp(-ceiling, ceiling)
        })
        .collect()
}

/// Scale the buffer toward a target RMS, capped at `max_gain` so silence and
/// noise floors are not blown up.
pub fn normalize_rms(samples: &[f32], target_rms: f32, max_gain: f32) -> Vec<f32> {
    let rms = if samples.is_empty() {
        0.0
    } else {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    };
    if rms < 1e-8 {
        return samples.to_vec();
    }
    let gain = (target_rms / rms).min(max_gain);
    samples.iter().map(|s| s * gain).collect()
}

/// Attenuate `main` when `key` is loud: the gain computer runs on the key
/// signal's envelope and is applied to the main signal. This is how the
/// ambience bed breathes with the music and how the instrumental makes room
/// for the vocal.
pub fn sidechain_duck(
    main: &AudioSignal,
    key: &AudioSignal,
    threshold: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup: f32,
) -> AudioSignal {
    debug_assert_eq!(main.sample_rate, key.sample_rate);
    let mut follower = EnvelopeFollower::new(attack_ms, release_ms, main.sample_rate);

    let samples = main
        .samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let key_level = key.samples.get(i).copied().unwrap_or(0.0);
            let env = follower.next(key_level);
            let gain = if env > threshold {
                (threshold + (env - threshold) / ratio) / env
            } else {
                1.0
            };
            s * gain * makeup
        })
        .collect();

    AudioSignal::new(samples, main.sample_rate)
}
