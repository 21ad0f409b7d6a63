//! Noise-derived ambience beds layered under the mix.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::chain::SignalChain;
use crate::audio::signal::AudioSignal;

/// The three background textures the engine knows. Which one a job gets is a
/// pure function of the mood, see `MoodLabel::ambience`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbienceKind {
    /// Deep, dark vinyl rumble: lowpassed brown noise.
    Vinyl,
    /// Rain-on-glass: band-passed pink noise.
    Rain,
    /// Standard lofi record crackle: bright-ish pink noise.
    Crackle,
}

impl AmbienceKind {
    /// Seeds are fixed per texture so the same job renders the same bed.
    fn seed(self) -> u64 {
        match self {
            AmbienceKind::Vinyl => 77,
            AmbienceKind::Rain => 11,
            AmbienceKind::Crackle => 22,
        }
    }

    fn shaping(self) -> SignalChain {
        match self {
            AmbienceKind::Vinyl => SignalChain::new().lowpass(800.0).gain(0.6),
            AmbienceKind::Rain => SignalChain::new().highpass(1000.0).lowpass(3000.0).gain(0.4),
            AmbienceKind::Crackle => SignalChain::new().highpass(1500.0).lowpass(4000.0).gain(0.5),
        }
    }
}

/// Render the bed for `kind`, `len` samples long.
pub fn ambience_bed(kind: AmbienceKind, len: usize, sample_rate: u32) -> Result<AudioSignal> {
    let mut rng = StdRng::seed_from_u64(kind.seed());
    let raw = match kind {
        AmbienceKind::Vinyl => brown_noise(len, &mut rng),
        AmbienceKind::Rain | AmbienceKind::Crackle => pink_noise(len, &mut rng),
    };
    kind.shaping().apply(&AudioSignal::new(raw, sample_rate))
}

/// Pink noise via the Voss-McCartney algorithm: seven octave bins updated at
/// halving rates, averaged into a 1/f spectrum.
pub fn pink_noise(len: usize, rng: &mut StdRng) -> Vec<f32> {
    const OCTAVES: usize = 7;
    let mut octaves = [0.0f32; OCTAVES];
    for o in octaves.iter_mut() {
        *o = rng.gen::<f32>() * 2.0 - 1.0;
    }
    let mut counter: u32 = 0;

    (0..len)
        .map(|_| {
            counter = counter.wrapping_add(1);
            let idx = counter.trailing_zeros() as usize;
            if idx < OCTAVES {
                octaves[idx] = rng.gen::<f32>() * 2.0 - 1.0;
            }
            let sum: f32 = octaves.iter().sum();
            sum / OCTAVES as f32
        })
        .collect()
}

/// Brown noise as a bounded random walk.
pub fn brown_noise(len: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut last = 0.0f32;
    (0..len)
        .map(|_| {
            let step = (rng.gen::<f32>() * 2.0 - 1.0) * 0.02;
            last = (last + step).clamp(-1.0, 1.0);
            last
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beds_are_reproducible() {
        let a = ambience_bed(AmbienceKind::Crackle, 4410, 44100).unwrap();
        let b = ambience_bed(AmbienceKind::Crackle, 4410, 44100).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn beds_are_audible_but_bounded() {
        for kind in [AmbienceKind::Vinyl, AmbienceKind::Rain, AmbienceKind::Crackle] {
            let bed = ambience_bed(kind, 44100, 44100).unwrap();
            assert_eq!(bed.len(), 44100);
            assert!(bed.rms() > 1e-4, "{kind:?} bed should not be silent");
            assert!(bed.peak() <= 1.5, "{kind:?} bed should stay tame");
        }
    }

    #[test]
    fn noise_sources_differ_per_seed() {
        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(2);
        assert_ne!(pink_noise(100, &mut a), pink_noise(100, &mut b));
    }

    #[test]
    fn brown_noise_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(brown_noise(10_000, &mut rng).iter().all(|s| s.abs() <= 1.0));
    }
}
