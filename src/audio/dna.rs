use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use super::signal::AudioSignal;

/// Everything runs at a reduced analysis rate; it is plenty for the
/// descriptors below and keeps the STFT cheap.
pub const ANALYSIS_RATE: u32 = 22050;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;

/// Median window (in STFT frames / bins) for harmonic-percussive separation.
const HPSS_KERNEL: usize = 17;

/// Technical descriptors of one input signal. Produced once, cached by the
/// caller; the engine never recomputes or mutates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackDNA {
    pub bpm: f32,
    pub percussiveness: f32,
    pub brightness: f32,
    pub bass_ratio: f32,
    pub is_drum_heavy: bool,
    pub is_bass_heavy: bool,
    pub is_already_dark: bool,
}

impl TrackDNA {
    /// Flags are a function of the numeric fields; this is the only way the
    /// engine builds a descriptor, so the thresholds cannot drift apart.
    pub fn from_metrics(bpm: f32, percussiveness: f32, brightness: f32, bass_ratio: f32) -> Self {
        Self {
            bpm,
            percussiveness,
            brightness,
            bass_ratio,
            is_drum_heavy: percussiveness > 0.35,
            is_bass_heavy: bass_ratio > 1.2,
            is_already_dark: brightness < 1200.0,
        }
    }

    /// Descriptor used when analysis cannot produce a usable result
    /// (silent or corrupt input). Downstream decisions stay defined.
    pub fn fallback() -> Self {
        Self {
            bpm: 75.0,
            percussiveness: 0.1,
            brightness: 1500.0,
            bass_ratio: 1.0,
            is_drum_heavy: false,
            is_bass_heavy: false,
            is_already_dark: false,
        }
    }
}

/// Extract the track DNA from a signal. Never fails outward: malformed,
/// empty or silent input yields `TrackDNA::fallback()`.
pub fn analyze(signal: &AudioSignal) -> TrackDNA {
    match analyze_inner(signal) {
        Ok(dna) => {
            log::info!(
                "DNA: bpm={:.1} percussiveness={:.3} brightness={:.0} bass_ratio={:.3} \
                 drum_heavy={} bass_heavy={} dark={}",
                dna.bpm, dna.percussiveness, dna.brightness, dna.bass_ratio,
                dna.is_drum_heavy, dna.is_bass_heavy, dna.is_already_dark
            );
            dna
        }
        Err(e) => {
            log::warn!("DNA analysis failed ({e}), using fallback descriptor");
            TrackDNA::fallback()
        }
    }
}

fn analyze_inner(signal: &AudioSignal) -> anyhow::Result<TrackDNA> {
    if signal.is_empty() {
        anyhow::bail!("empty signal");
    }
    if signal.peak() < 1e-6 {
        anyhow::bail!("silent signal");
    }
    if signal.samples.iter().any(|s| !s.is_finite()) {
        anyhow::bail!("non-finite samples");
    }

    let analysis = signal.resampled(ANALYSIS_RATE)?;
    let samples = &analysis.samples;
    if samples.len() < FFT_SIZE {
        anyhow::bail!("signal shorter than one analysis window");
    }

    let spectrogram = stft(samples);
    if spectrogram.is_empty() {
        anyhow::bail!("no analysis frames");
    }

    let bpm = estimate_tempo(&detect_onsets(&spectrogram));
    let percussiveness = hpss_energy_ratio(&spectrogram);
    let brightness = mean_spectral_centroid(&spectrogram);
    let bass_ratio = band_energy_ratio(&spectrogram);

    Ok(TrackDNA::from_metrics(bpm, percussiveness, brightness, bass_ratio))
}

/// Magnitude spectrogram, frames x FFT_SIZE/2 bins. Each frame plans its own
/// FFT so the pass parallelizes cleanly.
fn stft(samples: &[f32]) -> Vec<Vec<f32>> {
    let hann = hann_window(FFT_SIZE);
    let num_frames = (samples.len() - FFT_SIZE) / HOP_SIZE + 1;

    (0..num_frames)
        .into_par_iter()
        .map(|frame_idx| {
            let start = frame_idx * HOP_SIZE;
            let mut buffer: Vec<Complex<f32>> = samples[start..start + FFT_SIZE]
                .iter()
                .enumerate()
                .map(|(i, &s)| Complex::new(s * hann[i], 0.0))
                .collect();

            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(FFT_SIZE);
            fft.process(&mut buffer);

            buffer[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect()
        })
        .collect()
}

/// Spectral-flux onset times (seconds at the analysis rate) with an
/// adaptive local-mean threshold and a 100ms refractory gap.
fn detect_onsets(spectrogram: &[Vec<f32>]) -> Vec<f32> {
    let n = spectrogram.len();
    let mut flux_values: Vec<(f32, f32)> = Vec::with_capacity(n);
    for i in 0..n {
        let flux: f32 = if i == 0 {
            0.0
        } else {
            spectrogram[i]
                .iter()
                .zip(spectrogram[i - 1].iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum()
        };
        let time = (i * HOP_SIZE) as f32 / ANALYSIS_RATE as f32;
        flux_values.push((time, flux));
    }

    let window = 20;
    let mut onsets = Vec::new();

    for i in 0..flux_values.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(flux_values.len());
        let local_mean: f32 =
            flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>() / (end - start) as f32;

        let threshold = local_mean * 1.5 + 0.01;

        if flux_values[i].1 > threshold {
            let is_peak = (i == 0 || flux_values[i].1 >= flux_values[i - 1].1)
                && (i == flux_values.len() - 1 || flux_values[i].1 >= flux_values[i + 1].1);

            let far_enough = onsets
                .last()
                .map_or(true, |&last: &f32| flux_values[i].0 - last > 0.1);

            if is_peak && far_enough {
                onsets.push(flux_values[i].0);
            }
        }
    }

    onsets
}

/// Median inter-onset interval, constrained to a plausible 60-200 BPM band.
/// Beatless material falls back to the engine's default tempo.
fn estimate_tempo(onsets: &[f32]) -> f32 {
    if onsets.len() < 2 {
        return 75.0;
    }

    let intervals: Vec<f32> = onsets.windows(2).map(|w| w[1] - w[0]).collect();

    let reasonable: Vec<f32> = intervals
        .iter()
        .copied()
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return 75.0;
    }

    let median_interval = {
        let mut sorted = reasonable.clone();
        sorted.sort_by(f32::total_cmp);
        sorted[sorted.len() / 2]
    };

    60.0 / median_interval
}

/// Harmonic/percussive decomposition via median filtering of the magnitude
/// spectrogram: harmonic content is smooth along time, percussive content is
/// smooth along frequency. Returns percussive energy over harmonic energy.
fn hpss_energy_ratio(spectrogram: &[Vec<f32>]) -> f32 {
    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();
    let half = HPSS_KERNEL / 2;

    // Harmonic estimate: per-bin median across neighbouring frames.
    let harmonic: Vec<Vec<f32>> = (0..num_frames)
        .into_par_iter()
        .map(|t| {
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(num_frames);
            (0..num_bins)
                .map(|f| median_of(spectrogram[lo..hi].iter().map(|frame| frame[f])))
                .collect()
        })
        .collect();

    // Percussive estimate: per-frame median across neighbouring bins.
    let percussive: Vec<Vec<f32>> = spectrogram
        .par_iter()
        .map(|frame| {
            (0..num_bins)
                .map(|f| {
                    let lo = f.saturating_sub(half);
                    let hi = (f + half + 1).min(num_bins);
                    median_of(frame[lo..hi].iter().copied())
                })
                .collect()
        })
        .collect();

    // Soft masks from the squared enhanced spectrograms, then mean masked
    // energy per component.
    let mut h_energy = 0.0f64;
    let mut p_energy = 0.0f64;
    let count = (num_frames * num_bins) as f64;

    for t in 0..num_frames {
        for f in 0..num_bins {
            let h2 = (harmonic[t][f] as f64).powi(2);
            let p2 = (percussive[t][f] as f64).powi(2);
            let total = h2 + p2 + 1e-12;
            let mag = spectrogram[t][f] as f64;
            h_energy += mag * (h2 / total);
            p_energy += mag * (p2 / total);
        }
    }

    ((p_energy / count) / (h_energy / count + 1e-6)) as f32
}

fn median_of(values: impl Iterator<Item = f32>) -> f32 {
    let mut v: Vec<f32> = values.collect();
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(f32::total_cmp);
    v[v.len() / 2]
}

/// Mean spectral centroid in Hz across all frames with measurable energy.
fn mean_spectral_centroid(spectrogram: &[Vec<f32>]) -> f32 {
    let freq_resolution = ANALYSIS_RATE as f32 / FFT_SIZE as f32;
    let mut sum = 0.0f64;
    let mut frames_counted = 0usize;

    for frame in spectrogram {
        let total: f32 = frame.iter().sum();
        if total <= 1e-10 {
            continue;
        }
        let centroid: f32 = frame
            .iter()
            .enumerate()
            .map(|(i, &mag)| i as f32 * freq_resolution * mag)
            .sum::<f32>()
            / total;
        sum += centroid as f64;
        frames_counted += 1;
    }

    if frames_counted == 0 {
        0.0
    } else {
        (sum / frames_counted as f64) as f32
    }
}

/// Mean magnitude in the bass band (10-250 Hz) over the mid band
/// (250-2000 Hz).
fn band_energy_ratio(spectrogram: &[Vec<f32>]) -> f32 {
    let freq_resolution = ANALYSIS_RATE as f32 / FFT_SIZE as f32;
    let num_bins = spectrogram[0].len();

    let band_mean = |low_hz: f32, high_hz: f32| -> f32 {
        let low_bin = (low_hz / freq_resolution).ceil() as usize;
        let high_bin = ((high_hz / freq_resolution) as usize).min(num_bins);
        if low_bin >= high_bin {
            return 0.0;
        }
        let mut sum = 0.0f64;
        for frame in spectrogram {
            for &mag in &frame[low_bin..high_bin] {
                sum += mag as f64;
            }
        }
        (sum / (spectrogram.len() * (high_bin - low_bin)) as f64) as f32
    };

    let bass = band_mean(10.0, 250.0);
    let mid = band_mean(250.0, 2000.0);
    bass / (mid + 1e-6)
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, duration: f32, rate: u32) -> AudioSignal {
        let n = (duration * rate as f32) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        AudioSignal::new(samples, rate)
    }

    #[test]
    fn flags_follow_thresholds() {
        let dna = TrackDNA::from_metrics(90.0, 0.36, 1199.0, 1.21);
        assert!(dna.is_drum_heavy);
        assert!(dna.is_bass_heavy);
        assert!(dna.is_already_dark);

        let dna = TrackDNA::from_metrics(90.0, 0.35, 1200.0, 1.2);
        assert!(!dna.is_drum_heavy);
        assert!(!dna.is_bass_heavy);
        assert!(!dna.is_already_dark);
    }

    #[test]
    fn silent_signal_yields_fallback() {
        let silent = AudioSignal::silence(2.0, ANALYSIS_RATE);
        assert_eq!(analyze(&silent), TrackDNA::fallback());

        let empty = AudioSignal::new(Vec::new(), ANALYSIS_RATE);
        assert_eq!(analyze(&empty), TrackDNA::fallback());
    }

    #[test]
    fn non_finite_samples_yield_fallback() {
        let mut signal = sine(440.0, 3.0, ANALYSIS_RATE);
        signal.samples[1000] = f32::NAN;
        assert_eq!(analyze(&signal), TrackDNA::fallback());

        signal.samples[1000] = f32::INFINITY;
        assert_eq!(analyze(&signal), TrackDNA::fallback());
    }

    #[test]
    fn pure_sine_is_not_drum_heavy() {
        let signal = sine(440.0, 3.0, ANALYSIS_RATE);
        let dna = analyze(&signal);
        assert!(
            dna.percussiveness < 0.35,
            "sustained sine should read harmonic, got {}",
            dna.percussiveness
        );
        assert!(!dna.is_drum_heavy);
    }

    #[test]
    fn low_sine_reads_bass_heavy_and_dark() {
        let signal = sine(80.0, 3.0, ANALYSIS_RATE);
        let dna = analyze(&signal);
        assert!(dna.is_bass_heavy, "80 Hz tone should be bass heavy, ratio {}", dna.bass_ratio);
        assert!(dna.is_already_dark, "80 Hz tone should be dark, brightness {}", dna.brightness);
    }

    #[test]
    fn dna_round_trips_through_json() {
        let dna = TrackDNA::from_metrics(82.5, 0.4, 1700.0, 0.9);
        let json = serde_json::to_string(&dna).unwrap();
        let back: TrackDNA = serde_json::from_str(&json).unwrap();
        assert_eq!(dna, back);
    }
}
