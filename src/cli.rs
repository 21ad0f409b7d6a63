use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "atmoslofi", about = "DNA-aware lofi transformation and synthesis engine")]
pub struct Cli {
    /// Input instrumental audio file (WAV, MP3, FLAC, OGG)
    pub instrumental: Option<PathBuf>,

    /// Separate vocal stem. Pass the same path as the instrumental to run
    /// the lightweight mirrored-vocal chain instead.
    #[arg(long)]
    pub vocals: Option<PathBuf>,

    /// Mood label. Unrecognized labels fall back to Neutral.
    #[arg(short, long, default_value = "Neutral")]
    pub mood: String,

    /// Named parameter preset (see --list-presets)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Replace the instrumental with a procedurally generated lofi bed
    #[arg(long)]
    pub copyright_free: bool,

    /// Playback speed multiplier (0.5-1.2)
    #[arg(long)]
    pub speed: Option<f32>,

    /// Ambience bed volume (0.0-1.0)
    #[arg(long)]
    pub ambient_vol: Option<f32>,

    /// Instrumental gain (0.0-4.0)
    #[arg(long)]
    pub track_vol: Option<f32>,

    /// Echo/reverb wetness (0.0-1.0)
    #[arg(long)]
    pub reverb: Option<f32>,

    /// Vocal gain (0.3-2.0)
    #[arg(long)]
    pub vocal_vol: Option<f32>,

    /// Precomputed track DNA as JSON; skips the analysis pass
    #[arg(long)]
    pub dna: Option<PathBuf>,

    /// Analyze the input, print its DNA as JSON, and exit
    #[arg(long)]
    pub dump_dna: bool,

    /// Seed for tempo and snare randomness. Omit for a fresh mix each run.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory for the mp3/wav/mp4 artifacts
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Background image for the video. Defaults to mood-specific art under
    /// the assets directory.
    #[arg(long)]
    pub background: Option<PathBuf>,

    /// Skip the video artifact, produce only mp3 and wav
    #[arg(long)]
    pub no_video: bool,

    /// Config file path (defaults to atmoslofi.toml auto-detection)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List built-in presets and exit
    #[arg(long)]
    pub list_presets: bool,
}
