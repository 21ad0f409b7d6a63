use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub params: ParamsConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default)]
    pub no_video: bool,
}

/// Mix parameter defaults from the config file. Each field is optional so a
/// config only overrides what it names; CLI flags still win over these.
#[derive(Debug, Default, Deserialize)]
pub struct ParamsConfig {
    pub ambient_vol: Option<f32>,
    pub track_vol: Option<f32>,
    pub reverb_amount: Option<f32>,
    pub playback_speed: Option<f32>,
    pub vocal_vol: Option<f32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            assets_dir: default_assets_dir(),
            no_video: false,
        }
    }
}

fn default_output_dir() -> PathBuf { "output".into() }
fn default_assets_dir() -> PathBuf { "assets".into() }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
