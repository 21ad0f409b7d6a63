use anyhow::{Context, Result};

/// Base rate the engine mixes at. Analysis runs at a lower rate, see `dna`.
pub const BASE_SAMPLE_RATE: u32 = 44100;

/// A mono sample buffer. Every processing stage consumes a reference and
/// returns a fresh signal; nothing mutates a signal after it is produced.
#[derive(Clone, Debug)]
pub struct AudioSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Silent signal of the given duration.
    pub fn silence(duration_secs: f32, sample_rate: u32) -> Self {
        let n = (duration_secs.max(0.0) * sample_rate as f32) as usize;
        Self { samples: vec![0.0; n], sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.samples.iter().map(|s| s * s).sum::<f32>() / self.samples.len() as f32).sqrt()
    }

    /// Scale every sample by a constant gain.
    pub fn scaled(&self, gain: f32) -> AudioSignal {
        AudioSignal {
            samples: self.samples.iter().map(|s| s * gain).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Reinterpret the buffer at a different rate without touching samples.
    /// Played back at the original rate this shifts pitch and tempo together
    /// (the classic asetrate trick).
    pub fn reinterpreted(&self, sample_rate: u32) -> AudioSignal {
        AudioSignal {
            samples: self.samples.clone(),
            sample_rate,
        }
    }

    /// Sinc resample to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> Result<AudioSignal> {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(AudioSignal {
                samples: self.samples.clone(),
                sample_rate: target_rate,
            });
        }
        let samples = resample(&self.samples, self.sample_rate, target_rate)?;
        Ok(AudioSignal { samples, sample_rate: target_rate })
    }
}

/// Resample mono f32 audio between arbitrary rates using rubato.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        samples.len(),
        1, // mono
    )
    .context("Failed to create resampler")?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None).context("Resampling failed")?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Sum `overlay` into `base` sample-by-sample, truncating to the shorter
/// buffer ("duration=first" semantics). Both signals must share a rate.
pub fn mix(base: &AudioSignal, overlay: &AudioSignal) -> AudioSignal {
    debug_assert_eq!(base.sample_rate, overlay.sample_rate);
    let mut samples = base.samples.clone();
    for (out, s) in samples.iter_mut().zip(overlay.samples.iter()) {
        *out += s;
    }
    AudioSignal {
        samples,
        sample_rate: base.sample_rate,
    }
}

/// Repeat `loop_signal` end-to-end until it covers `target_len` samples.
pub fn tile(loop_signal: &AudioSignal, target_len: usize) -> AudioSignal {
    let mut samples = Vec::with_capacity(target_len);
    if loop_signal.samples.is_empty() {
        samples.resize(target_len, 0.0);
    } else {
        while samples.len() < target_len {
            let take = (target_len - samples.len()).min(loop_signal.samples.len());
            samples.extend_from_slice(&loop_signal.samples[..take]);
        }
    }
    AudioSignal {
        samples,
        sample_rate: loop_signal.sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_requested_duration() {
        let s = AudioSignal::silence(2.0, 44100);
        assert_eq!(s.len(), 88200);
        assert_eq!(s.rms(), 0.0);
    }

    #[test]
    fn reinterpret_keeps_samples() {
        let s = AudioSignal::new(vec![0.5, -0.5, 0.25], 44100);
        let r = s.reinterpreted(37485);
        assert_eq!(r.samples, s.samples);
        assert_eq!(r.sample_rate, 37485);
        assert!(r.duration_secs() > s.duration_secs());
    }

    #[test]
    fn mix_truncates_to_base() {
        let a = AudioSignal::new(vec![0.1; 100], 44100);
        let b = AudioSignal::new(vec![0.2; 50], 44100);
        let m = mix(&a, &b);
        assert_eq!(m.len(), 100);
        assert!((m.samples[0] - 0.3).abs() < 1e-6);
        assert!((m.samples[60] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn tile_covers_target_exactly() {
        let l = AudioSignal::new(vec![1.0, 2.0, 3.0], 44100);
        let t = tile(&l, 8);
        assert_eq!(t.samples, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn resample_halves_length() {
        let s = AudioSignal::new(vec![0.0; 44100], 44100);
        let r = s.resampled(22050).unwrap();
        let expected = 22050;
        let tolerance = expected / 100;
        assert!(
            (r.len() as i64 - expected as i64).unsigned_abs() as usize <= tolerance,
            "expected ~{expected}, got {}",
            r.len()
        );
    }
}
