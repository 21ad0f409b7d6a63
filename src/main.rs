mod audio;
mod cli;
mod config;
mod dsp;
mod encode;
mod engine;
mod error;
mod synth;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use audio::signal::BASE_SAMPLE_RATE;
use cli::Cli;
use engine::orchestrator::{self, RenderRequest, VocalStem};
use engine::params::{self, MoodLabel, ParamOverrides, ProcessingParams};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect atmoslofi.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("atmoslofi.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("atmoslofi").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("atmoslofi").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = config::Config::default();
    if let Some(ref path) = config_path {
        if let Some(loaded) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.list_presets {
        println!("Available presets:");
        for name in params::PRESET_NAMES {
            if let Some(p) = params::preset(name) {
                println!(
                    "  {:<18} speed={:.2} ambient={:.2} reverb={:.2}",
                    name, p.playback_speed, p.ambient_vol, p.reverb_amount
                );
            }
        }
        return Ok(());
    }

    // Config supplies the output directory only when the CLI is at its default.
    let output_dir = if cli.output_dir == PathBuf::from("output") {
        cfg.output.dir.clone()
    } else {
        cli.output_dir.clone()
    };

    let input = cli.instrumental.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let mood: MoodLabel = cli.mood.parse().unwrap_or(MoodLabel::Neutral);

    // Merge: preset (or defaults) < config file < CLI flags.
    let base = match cli.preset.as_deref() {
        Some(name) => params::preset(name).with_context(|| {
            format!("Unknown preset {:?}. Available: {}", name, params::PRESET_NAMES.join(", "))
        })?,
        None => ProcessingParams::default(),
    };
    let base = base.with_overrides(&ParamOverrides {
        ambient_vol: cfg.params.ambient_vol,
        track_vol: cfg.params.track_vol,
        reverb_amount: cfg.params.reverb_amount,
        playback_speed: cfg.params.playback_speed,
        vocal_vol: cfg.params.vocal_vol,
    });
    let processing = base.with_overrides(&ParamOverrides {
        ambient_vol: cli.ambient_vol,
        track_vol: cli.track_vol,
        reverb_amount: cli.reverb,
        playback_speed: cli.speed,
        vocal_vol: cli.vocal_vol,
    });

    log::info!("atmoslofi - DNA-aware lofi engine");
    log::info!("Input: {}", input.display());
    log::info!("Mood: {}", mood.as_str());
    log::info!(
        "Params: speed={:.2} ambient={:.2} track={:.2} reverb={:.2} vocal={:.2}",
        processing.playback_speed,
        processing.ambient_vol,
        processing.track_vol,
        processing.reverb_amount,
        processing.vocal_vol
    );

    let pb = ProgressBar::new(5);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    pb.set_message("decoding");
    // The engine mixes at the base rate; conform inputs up front.
    let instrumental = audio::decode::decode_audio(input)?.resampled(BASE_SAMPLE_RATE)?;
    log::info!(
        "Decoded {:.1}s @ {} Hz",
        instrumental.duration_secs(),
        instrumental.sample_rate
    );
    pb.inc(1);

    pb.set_message("analyzing DNA");
    let dna: audio::dna::TrackDNA = match cli.dna.as_ref() {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read DNA file {}", path.display()))?;
            let dna = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse DNA file {}", path.display()))?;
            log::info!("Loaded DNA from {}", path.display());
            dna
        }
        None => audio::dna::analyze(&instrumental),
    };
    pb.inc(1);

    if cli.dump_dna {
        pb.finish_and_clear();
        println!("{}", serde_json::to_string_pretty(&dna)?);
        return Ok(());
    }

    // The vocal stem. Passing the instrumental itself is the stem-separation
    // fallback and switches the mix to the mirrored chain.
    let separate_vocals = match cli.vocals.as_ref() {
        Some(path) if path == input => None,
        Some(path) => Some(audio::decode::decode_audio(path)?.resampled(BASE_SAMPLE_RATE)?),
        None => None,
    };
    let vocals = match (&separate_vocals, cli.vocals.is_some()) {
        (Some(signal), _) => VocalStem::Separate(signal),
        (None, true) => VocalStem::Mirrored,
        (None, false) => VocalStem::None,
    };

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    pb.set_message("mixing");
    let request = RenderRequest {
        instrumental: &instrumental,
        vocals,
        dna: &dna,
        mood,
        params: processing,
        structure: None,
        copyright_free: cli.copyright_free,
    };
    let outcome = orchestrator::render(&request, &mut rng)?;
    if outcome.synthesis_fallback {
        log::warn!("Copyright-free synthesis fell back to the original instrumental");
    }
    pb.inc(1);

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    // Collision-safe artifact names: input stem + pid.
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".into());
    let tag = format!("{}_{}", stem, std::process::id());
    let mp3_path = output_dir.join(format!("{tag}_lofi.mp3"));
    let wav_path = output_dir.join(format!("{tag}_lofi.wav"));
    let mp4_path = output_dir.join(format!("{tag}_lofi.mp4"));

    pb.set_message("encoding mp3/wav");
    encode::ffmpeg::export_mp3(&outcome.master, &mp3_path)
        .map_err(|e| error::EngineError::Encode(format!("{e:#}")))?;
    encode::ffmpeg::export_wav_from_mp3(&mp3_path, &wav_path)
        .map_err(|e| error::EngineError::Encode(format!("{e:#}")))?;
    pb.inc(1);

    if cli.no_video || cfg.output.no_video {
        pb.inc(1);
        pb.finish_with_message("done");
        log::info!("Video skipped");
        log::info!("Done! Outputs: {} / {}", mp3_path.display(), wav_path.display());
        return Ok(());
    }

    pb.set_message("muxing video");
    let background = cli
        .background
        .clone()
        .unwrap_or_else(|| cfg.output.assets_dir.join(mood.background_asset()));
    if background.exists() {
        encode::ffmpeg::mux_video(&mp3_path, &background, &mp4_path, mood)
            .map_err(|e| error::EngineError::Encode(format!("{e:#}")))?;
    } else {
        log::warn!("Background image not found ({}), skipping video", background.display());
    }
    pb.inc(1);
    pb.finish_with_message("done");

    log::info!("Done! Outputs in {}", output_dir.display());
    Ok(())
}
