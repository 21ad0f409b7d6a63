//! The signal-chain orchestrator: turns DNA + mood + parameters into a
//! concrete processing plan and runs the three passes (instrumental shaping,
//! vocal overlay, mastering) over it.
//!
//! The plan is derived up front as a plain value so its structure can be
//! inspected and tested without rendering a single sample.

use rand::rngs::StdRng;
use rand::Rng;

use super::params::{MoodLabel, ProcessingParams, StructureSegment};
use crate::audio::dna::TrackDNA;
use crate::audio::signal::{self, AudioSignal, BASE_SAMPLE_RATE};
use crate::dsp::chain::SignalChain;
use crate::dsp::dynamics::sidechain_duck;
use crate::dsp::noise::{self, AmbienceKind};
use crate::error::EngineError;
use crate::synth::{chords, drums};

/// Tempo candidates for a synthesized replacement instrumental.
const CF_BPM_CANDIDATES: [f32; 6] = [72.0, 75.0, 78.0, 80.0, 82.0, 85.0];

/// Probe fallback when the instrumental's duration is unreadable.
const CF_FALLBACK_DURATION: f32 = 240.0;
/// Never synthesize more than ten minutes.
const CF_MAX_DURATION: f32 = 600.0;
/// Safety buffer so the backing track outlasts the original.
const CF_DURATION_PAD: f32 = 5.0;

/// The vocal input. `Mirrored` marks the stem-separation fallback where the
/// "vocal" file was the instrumental itself; the mixing pass must not
/// sidechain in that case (ducking a signal against itself collapses the
/// mix to near-silence).
#[derive(Clone, Copy, Debug)]
pub enum VocalStem<'a> {
    None,
    Separate(&'a AudioSignal),
    Mirrored,
}

pub struct RenderRequest<'a> {
    pub instrumental: &'a AudioSignal,
    pub vocals: VocalStem<'a>,
    pub dna: &'a TrackDNA,
    pub mood: MoodLabel,
    pub params: ProcessingParams,
    /// Future extension hook; carried through untouched.
    pub structure: Option<&'a [StructureSegment]>,
    pub copyright_free: bool,
}

/// Everything derived from DNA + mood + params before rendering starts.
#[derive(Clone, Debug)]
pub struct RenderPlan {
    pub bass_shelf_gain_db: f32,
    pub muffle_cutoff: f32,
    pub ambience: AmbienceKind,
    pub add_drums: bool,
    pub drum_bpm: f32,
    pub instrumental_chain: SignalChain,
    pub mastering_chain: SignalChain,
}

pub struct RenderOutcome {
    pub master: AudioSignal,
    pub plan: RenderPlan,
    /// True when copyright-free synthesis failed and the original
    /// instrumental was used instead.
    pub synthesis_fallback: bool,
}

/// Derive the processing plan. Pure: same inputs, same plan.
pub fn plan(dna: &TrackDNA, mood: MoodLabel, params: &ProcessingParams) -> RenderPlan {
    // Bass-heavy songs get a gentler shelf; the low end is already there.
    let bass_shelf_gain_db = if dna.is_bass_heavy { 2.0 } else { 5.0 };

    // Bright songs get cut harder; already-dark songs keep more air.
    let muffle_cutoff = if dna.is_already_dark {
        9000.0
    } else if dna.brightness > 1800.0 {
        6500.0
    } else {
        7500.0
    };

    let add_drums = !dna.is_drum_heavy && !mood.suppresses_drums();

    // Keep the synthetic layer near the lofi comfort zone even when the
    // source tempo is fast; double-time sources fold down an octave.
    let mut drum_bpm = dna.bpm;
    if drum_bpm > 100.0 {
        drum_bpm /= 2.0;
    }
    let drum_bpm = drum_bpm.clamp(CF_BPM_CANDIDATES[0], CF_BPM_CANDIDATES[5]);

    let instrumental_chain = SignalChain::new()
        .vibrato(2.0, 0.03)
        .equalizer(200.0, 150.0, 3.0) // bass body
        .equalizer(400.0, 250.0, 4.0) // warm mud range
        .equalizer(3500.0, 1000.0, -2.0) // nasal cut
        .low_shelf(120.0, bass_shelf_gain_db)
        .high_shelf(5000.0, -12.0)
        .lowpass(muffle_cutoff)
        .lowpass(5500.0) // cymbal cut
        .equalizer(8000.0, 1000.0, -20.0) // ride suppression
        .equalizer(2500.0, 1000.0, -4.0)
        .gain((params.track_vol * 0.4).min(2.0));

    let mastering_chain = SignalChain::new()
        .low_shelf(100.0, 3.0)
        .equalizer(300.0, 200.0, 2.0)
        .high_shelf(8000.0, -5.0)
        .lowpass(12500.0)
        .compressor(0.12, 2.5, 5.0, 50.0, 2.0)
        .limiter(0.98, 5.0, 50.0);

    RenderPlan {
        bass_shelf_gain_db,
        muffle_cutoff,
        ambience: mood.ambience(),
        add_drums,
        drum_bpm,
        instrumental_chain,
        mastering_chain,
    }
}

/// Duration used to size a synthesized replacement. Empty input defaults to
/// four minutes; anything longer than ten is capped.
pub fn probe_duration(instrumental: &AudioSignal) -> f32 {
    let dur = instrumental.duration_secs();
    if dur <= 0.0 {
        CF_FALLBACK_DURATION
    } else {
        dur.min(CF_MAX_DURATION)
    }
}

/// Run the whole job. The rng drives the copyright-free tempo choice and
/// the drum-loop snare noise; pass a seeded one for reproducible renders.
pub fn render(req: &RenderRequest, rng: &mut StdRng) -> Result<RenderOutcome, EngineError> {
    let params = req.params.clamped();
    let plan = plan(req.dna, req.mood, &params);

    log::info!(
        "Plan: bass_shelf={}dB muffle={}Hz ambience={:?} drums={} (mood {})",
        plan.bass_shelf_gain_db,
        plan.muffle_cutoff,
        plan.ambience,
        if plan.add_drums { "on" } else { "off" },
        req.mood.as_str()
    );

    // Copyright-free substitution happens before any shaping.
    let mut synthesis_fallback = false;
    let mut drum_bpm = plan.drum_bpm;
    let substituted: Option<AudioSignal> = if req.copyright_free {
        let target = probe_duration(req.instrumental) + CF_DURATION_PAD;
        let base_bpm = CF_BPM_CANDIDATES[rng.gen_range(0..CF_BPM_CANDIDATES.len())];
        let bpm = base_bpm + rng.gen_range(-3.0..3.0);
        match chords::generate(target, bpm) {
            Ok(synth) if !synth.is_empty() => {
                log::info!("Replaced instrumental with {:.0}s original beat @ {:.1} BPM", target, bpm);
                drum_bpm = base_bpm;
                Some(synth)
            }
            Ok(_) => {
                log::warn!("Copyright-free synthesis produced no audio, keeping original");
                synthesis_fallback = true;
                None
            }
            Err(e) => {
                log::warn!("Copyright-free synthesis failed ({e}), keeping original");
                synthesis_fallback = true;
                None
            }
        }
    } else {
        None
    };
    let instrumental = substituted.as_ref().unwrap_or(req.instrumental);

    if let Some(structure) = req.structure {
        log::debug!("Structure hints: {} segments (pass-through)", structure.len());
    }

    // Pass 1: instrumental shaping + ambience + optional drum layer.
    let shaped = plan.instrumental_chain.apply(instrumental)?;

    let bed = noise::ambience_bed(plan.ambience, shaped.len(), shaped.sample_rate)?;
    let bed = sidechain_duck(&bed, &shaped, 0.15, 3.0, 20.0, 300.0, 1.0);
    let bed = bed.scaled((params.ambient_vol * 1.5).max(0.02));

    let mut pass1 = signal::mix(&shaped, &bed);

    if plan.add_drums {
        let bar_secs = 4.0 * 60.0 / drum_bpm;
        let one_loop = drums::generate(bar_secs * 2.0, drum_bpm, rng);
        let tiled = signal::tile(&one_loop, pass1.len());
        let drum_chain = SignalChain::new().high_shelf(6000.0, -6.0).gain(0.5);
        let drum_layer = drum_chain.apply(&tiled)?;
        pass1 = signal::mix(&pass1, &drum_layer);
    } else {
        log::info!("Drum layer skipped (drum_heavy={} mood={})", req.dna.is_drum_heavy, req.mood.as_str());
    }

    let pass1 = pass1.scaled(1.2);

    // Pass 2: vocal overlay.
    let echo_wet = (params.reverb_amount / 0.6).clamp(0.0, 1.5);
    let pass2 = match req.vocals {
        VocalStem::None => pass1,
        VocalStem::Separate(vocals) => {
            let vocal_chain = SignalChain::new()
                .highpass(100.0)
                .equalizer(250.0, 200.0, -2.0) // mud trim
                .equalizer(900.0, 400.0, 4.0)
                .equalizer(1500.0, 500.0, 5.0) // presence
                .equalizer(3000.0, 800.0, 3.0)
                .equalizer(5000.0, 600.0, -1.0) // sibilance
                .high_shelf(10000.0, -4.0)
                .gain((params.vocal_vol * 15.0).max(4.0))
                .equalizer(2500.0, 800.0, 12.0)
                .compressor(0.08, 6.0, 5.0, 150.0, 5.0)
                .echo(55.0, (0.38 * echo_wet).min(0.9), 0.7, 0.35)
                .echo(175.0, (0.28 * echo_wet).min(0.9), 0.55, 0.22)
                .normalize(0.25, 20.0)
                .limiter(0.92, 5.0, 50.0);
            let vox = vocal_chain.apply(vocals)?;

            // Carve out the bands the vocal lives in, then duck the
            // instrumental under it.
            let carve = SignalChain::new()
                .equalizer(600.0, 200.0, -4.0)
                .equalizer(1500.0, 500.0, -6.0);
            let carved = carve.apply(&pass1)?;
            let ducked = sidechain_duck(&carved, &vox, 0.08, 4.5, 10.0, 350.0, 1.0);

            signal::mix(&ducked, &vox).scaled(1.1)
        }
        VocalStem::Mirrored => {
            // Identical stems: no sidechain, lighter chain, plain sum. The
            // mirrored source is the post-substitution instrumental so a
            // synthesized replacement covers this pass too.
            log::info!("Identical stems detected, bypassing sidechain ducking");
            let vocal_chain = SignalChain::new()
                .highpass(150.0)
                .gain((params.vocal_vol * 8.0).max(4.0))
                .echo(60.0, (0.2 * echo_wet).min(0.9), 0.8, 0.2);
            let vox = vocal_chain.apply(instrumental)?;
            signal::mix(&pass1, &vox).scaled(0.9)
        }
    };

    // Mastering: the slowed pitch-and-tempo drop, then warm EQ, glue
    // compression and a hard ceiling.
    let shifted_rate = (BASE_SAMPLE_RATE as f32 * params.playback_speed) as u32;
    let slowed = pass2
        .reinterpreted(shifted_rate)
        .resampled(BASE_SAMPLE_RATE)
        .map_err(EngineError::Pipeline)?;

    let master = plan.mastering_chain.apply(&slowed)?;

    log::info!(
        "Master rendered: {:.1}s (speed {:.2}), peak {:.3}",
        master.duration_secs(),
        params.playback_speed,
        master.peak()
    );

    Ok(RenderOutcome { master, plan, synthesis_fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sine(freq: f32, duration: f32) -> AudioSignal {
        let sr = BASE_SAMPLE_RATE;
        let n = (duration * sr as f32) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.3)
            .collect();
        AudioSignal::new(samples, sr)
    }

    fn neutral_dna() -> TrackDNA {
        TrackDNA::from_metrics(120.0, 0.2, 1500.0, 1.0)
    }

    fn request<'a>(
        instrumental: &'a AudioSignal,
        dna: &'a TrackDNA,
        mood: MoodLabel,
    ) -> RenderRequest<'a> {
        RenderRequest {
            instrumental,
            vocals: VocalStem::None,
            dna,
            mood,
            params: ProcessingParams::default(),
            structure: None,
            copyright_free: false,
        }
    }

    #[test]
    fn bass_heavy_reduces_shelf_boost() {
        let params = ProcessingParams::default();
        let normal = plan(&TrackDNA::from_metrics(90.0, 0.2, 1500.0, 1.0), MoodLabel::Neutral, &params);
        let bassy = plan(&TrackDNA::from_metrics(90.0, 0.2, 1500.0, 1.5), MoodLabel::Neutral, &params);
        assert_eq!(normal.bass_shelf_gain_db, 5.0);
        assert_eq!(bassy.bass_shelf_gain_db, 2.0);
    }

    #[test]
    fn muffle_cutoff_follows_brightness() {
        let params = ProcessingParams::default();
        let bright = plan(&TrackDNA::from_metrics(90.0, 0.2, 2000.0, 1.0), MoodLabel::Neutral, &params);
        let normal = plan(&TrackDNA::from_metrics(90.0, 0.2, 1500.0, 1.0), MoodLabel::Neutral, &params);
        let dark = plan(&TrackDNA::from_metrics(90.0, 0.2, 1000.0, 1.0), MoodLabel::Neutral, &params);
        assert_eq!(bright.muffle_cutoff, 6500.0);
        assert_eq!(normal.muffle_cutoff, 7500.0);
        assert_eq!(dark.muffle_cutoff, 9000.0, "dark songs keep more air");
    }

    #[test]
    fn drum_layer_omitted_for_drum_heavy_or_calm() {
        let params = ProcessingParams::default();
        let drummy = TrackDNA::from_metrics(90.0, 0.5, 1500.0, 1.0);
        assert!(!plan(&drummy, MoodLabel::Neutral, &params).add_drums);
        let mellow = neutral_dna();
        assert!(!plan(&mellow, MoodLabel::Sad, &params).add_drums);
        assert!(!plan(&mellow, MoodLabel::Calm, &params).add_drums);
        assert!(plan(&mellow, MoodLabel::Happy, &params).add_drums);
    }

    #[test]
    fn plan_chain_reflects_dna_table() {
        use crate::dsp::chain::ChainOp;
        let params = ProcessingParams::default();
        let p = plan(&TrackDNA::from_metrics(90.0, 0.2, 2000.0, 1.5), MoodLabel::Neutral, &params);
        assert!(p
            .instrumental_chain
            .ops
            .contains(&ChainOp::LowShelf { freq: 120.0, gain_db: 2.0 }));
        assert!(p.instrumental_chain.ops.contains(&ChainOp::Lowpass { cutoff: 6500.0 }));
    }

    #[test]
    fn probe_duration_caps_and_defaults() {
        assert_eq!(probe_duration(&AudioSignal::new(Vec::new(), BASE_SAMPLE_RATE)), 240.0);
        let long = AudioSignal::silence(700.0, 8000);
        assert_eq!(probe_duration(&long), 600.0);
        let short = sine(440.0, 3.0);
        assert!((probe_duration(&short) - 3.0).abs() < 1e-3);
    }

    #[test]
    fn output_duration_scales_inversely_with_speed() {
        let instrumental = sine(440.0, 10.0);
        let dna = neutral_dna();
        let mut req = request(&instrumental, &dna, MoodLabel::Calm);
        req.params.playback_speed = 0.85;

        let mut rng = StdRng::seed_from_u64(1);
        let outcome = render(&req, &mut rng).unwrap();

        let expected = 10.0 / 0.85;
        let got = outcome.master.duration_secs();
        assert!(
            (got - expected).abs() / expected < 0.01,
            "expected ~{expected:.2}s, got {got:.2}s"
        );
    }

    #[test]
    fn calm_mood_renders_without_drums_and_with_rain() {
        let instrumental = sine(440.0, 4.0);
        let dna = neutral_dna();
        let req = request(&instrumental, &dna, MoodLabel::Calm);

        let mut rng = StdRng::seed_from_u64(2);
        let outcome = render(&req, &mut rng).unwrap();
        assert!(!outcome.plan.add_drums);
        assert_eq!(outcome.plan.ambience, AmbienceKind::Rain);
        assert!(outcome.master.rms() > 0.01);
    }

    #[test]
    fn mirrored_vocals_keep_the_mix_audible() {
        let instrumental = sine(330.0, 4.0);
        let dna = neutral_dna();
        let mut req = request(&instrumental, &dna, MoodLabel::Neutral);
        req.vocals = VocalStem::Mirrored;

        let mut rng = StdRng::seed_from_u64(3);
        let outcome = render(&req, &mut rng).unwrap();
        assert!(
            outcome.master.rms() > 0.02,
            "mirrored stems must not collapse to silence, rms {}",
            outcome.master.rms()
        );
    }

    #[test]
    fn separate_vocals_mix_above_the_floor() {
        let instrumental = sine(220.0, 4.0);
        let vocals = sine(880.0, 4.0);
        let dna = neutral_dna();
        let mut req = request(&instrumental, &dna, MoodLabel::Neutral);
        req.vocals = VocalStem::Separate(&vocals);

        let mut rng = StdRng::seed_from_u64(4);
        let outcome = render(&req, &mut rng).unwrap();
        assert!(outcome.master.rms() > 0.02);
    }

    #[test]
    fn copyright_free_substitutes_longer_original_material() {
        let instrumental = sine(440.0, 3.0);
        let dna = neutral_dna();
        let mut req = request(&instrumental, &dna, MoodLabel::Happy);
        req.copyright_free = true;
        req.params.playback_speed = 1.0;

        let mut rng = StdRng::seed_from_u64(5);
        let outcome = render(&req, &mut rng).unwrap();
        assert!(!outcome.synthesis_fallback);
        // Probe 3s + 5s pad, rendered at speed 1.0.
        assert!(
            outcome.master.duration_secs() >= 8.0 - 0.1,
            "got {:.2}s",
            outcome.master.duration_secs()
        );
    }

    #[test]
    fn copyright_free_mirrored_mix_carries_no_source_material() {
        // With substitution active, nothing from the input signal may reach
        // the master through any pass; two renders that differ only in the
        // input content must come out identical.
        let dna = neutral_dna();
        let mut rng_a = StdRng::seed_from_u64(6);
        let mut rng_b = StdRng::seed_from_u64(6);

        let input_a = sine(440.0, 2.0);
        let mut req_a = request(&input_a, &dna, MoodLabel::Neutral);
        req_a.vocals = VocalStem::Mirrored;
        req_a.copyright_free = true;
        let master_a = render(&req_a, &mut rng_a).unwrap().master;

        let input_b = sine(523.0, 2.0);
        let mut req_b = request(&input_b, &dna, MoodLabel::Neutral);
        req_b.vocals = VocalStem::Mirrored;
        req_b.copyright_free = true;
        let master_b = render(&req_b, &mut rng_b).unwrap().master;

        assert_eq!(master_a.samples, master_b.samples);
    }

    #[test]
    fn copyright_free_tempo_comes_from_candidate_set() {
        let dna = neutral_dna();
        let params = ProcessingParams::default();
        // The drum bpm in the plan is clamped to the candidate range too.
        let p = plan(&dna, MoodLabel::Happy, &params);
        assert!(p.drum_bpm >= 72.0 && p.drum_bpm <= 85.0);
    }
}
