//! Additive note rendering: a weighted stack of sine harmonics under an
//! ADSR envelope, then a lowpass to mellow the top end. This is what gives
//! the chord pad its electric-piano character without any sampled material.

use anyhow::Result;
use std::f32::consts::PI;

use crate::dsp::filter;

/// Harmonic recipe as (harmonic order, amplitude) pairs.
pub type Harmonics = &'static [(u32, f32)];

/// Fundamental plus gently decaying 2nd/3rd/4th partials.
pub const EP_HARMONICS: Harmonics = &[(1, 1.0), (2, 0.28), (3, 0.08), (4, 0.03)];

/// Bass wants almost a pure fundamental.
pub const BASS_HARMONICS: Harmonics = &[(1, 1.0), (2, 0.22)];

const ATTACK_SECS: f32 = 0.012;
const DECAY_SECS: f32 = 0.08;
const SUSTAIN_LEVEL: f32 = 0.60;
const RELEASE_SECS: f32 = 0.18;

/// The atomic unit the synthesizer renders.
#[derive(Clone, Debug)]
pub struct NoteEvent {
    pub frequency: f32,
    pub duration: f32,
    pub harmonics: Harmonics,
    pub velocity: f32,
    pub cutoff: f32,
}

impl NoteEvent {
    /// Render to a mono buffer at `sample_rate`.
    pub fn render(&self, sample_rate: u32) -> Result<Vec<f32>> {
        let n = (self.duration * sample_rate as f32) as usize;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut out = vec![0.0f32; n];
        for &(order, amp) in self.harmonics {
            let omega = 2.0 * PI * self.frequency * order as f32 / sample_rate as f32;
            for (i, sample) in out.iter_mut().enumerate() {
                *sample += amp * (omega * i as f32).sin();
            }
        }

        let env = adsr_envelope(n, sample_rate);
        for (sample, e) in out.iter_mut().zip(env.iter()) {
            *sample *= e * self.velocity;
        }

        filter::lowpass(&out, sample_rate, self.cutoff)
    }
}

/// Linear attack/decay/release segments around a sustain plateau. Short
/// notes shrink the plateau rather than the transients.
fn adsr_envelope(n: usize, sample_rate: u32) -> Vec<f32> {
    let atk = ((ATTACK_SECS * sample_rate as f32) as usize).max(1);
    let dec = ((DECAY_SECS * sample_rate as f32) as usize).max(1);
    let rel = ((RELEASE_SECS * sample_rate as f32) as usize).max(1);

    let mut env = vec![SUSTAIN_LEVEL; n];
    for (i, e) in env.iter_mut().take(atk.min(n)).enumerate() {
        *e = i as f32 / atk as f32;
    }
    let d_end = (atk + dec).min(n);
    for i in atk.min(n)..d_end {
        let t = (i - atk) as f32 / dec as f32;
        env[i] = 1.0 - (1.0 - SUSTAIN_LEVEL) * t;
    }
    if rel < n {
        let start = n - rel;
        for i in start..n {
            let t = (i - start) as f32 / rel as f32;
            env[i] *= 1.0 - t;
        }
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_has_expected_length() {
        let note = NoteEvent {
            frequency: 220.0,
            duration: 0.5,
            harmonics: EP_HARMONICS,
            velocity: 0.5,
            cutoff: 2400.0,
        };
        let buf = note.render(44100).unwrap();
        assert_eq!(buf.len(), 22050);
    }

    #[test]
    fn note_starts_and_ends_quiet() {
        let note = NoteEvent {
            frequency: 220.0,
            duration: 1.0,
            harmonics: EP_HARMONICS,
            velocity: 0.6,
            cutoff: 2400.0,
        };
        let buf = note.render(44100).unwrap();
        assert!(buf[0].abs() < 0.01, "attack should start from silence");
        assert!(buf[buf.len() - 1].abs() < 0.05, "release should land near silence");
        let mid = buf[buf.len() / 2].abs();
        let peak = buf.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak > mid * 0.5, "sustain should sit below the attack peak");
    }

    #[test]
    fn zero_duration_renders_nothing() {
        let note = NoteEvent {
            frequency: 220.0,
            duration: 0.0,
            harmonics: BASS_HARMONICS,
            velocity: 0.6,
            cutoff: 650.0,
        };
        assert!(note.render(44100).unwrap().is_empty());
    }
}
