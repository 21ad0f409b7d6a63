//! Mood and parameter model. Moods are a closed enumeration, and every
//! decision derived from them is a single lookup, so an unknown label can
//! never fall through two branches differently.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::dsp::noise::AmbienceKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodLabel {
    Happy,
    Sad,
    Calm,
    Romantic,
    Neutral,
    Heartbreak,
    Cyberpunk,
    RainyCafe,
}

impl MoodLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "Happy",
            MoodLabel::Sad => "Sad",
            MoodLabel::Calm => "Calm",
            MoodLabel::Romantic => "Romantic",
            MoodLabel::Neutral => "Neutral",
            MoodLabel::Heartbreak => "Heartbreak",
            MoodLabel::Cyberpunk => "Cyberpunk",
            MoodLabel::RainyCafe => "Rainy Cafe",
        }
    }

    /// Which background texture sits under the mix.
    pub fn ambience(&self) -> AmbienceKind {
        match self {
            MoodLabel::Sad | MoodLabel::Heartbreak => AmbienceKind::Vinyl,
            MoodLabel::Calm | MoodLabel::RainyCafe => AmbienceKind::Rain,
            _ => AmbienceKind::Crackle,
        }
    }

    /// Low-energy moods keep the synthetic drum layer out of the mix.
    pub fn suppresses_drums(&self) -> bool {
        matches!(self, MoodLabel::Sad | MoodLabel::Calm | MoodLabel::Heartbreak)
    }

    /// Background art key for the video mux. Unknown assets degrade to the
    /// default at encode time.
    pub fn background_asset(&self) -> &'static str {
        match self {
            MoodLabel::Sad | MoodLabel::Heartbreak => "sad.png",
            MoodLabel::Calm | MoodLabel::Romantic | MoodLabel::Happy | MoodLabel::RainyCafe => {
                "calm.png"
            }
            MoodLabel::Cyberpunk => "cyberpunk.png",
            MoodLabel::Neutral => "lofi_bg.jpg",
        }
    }
}

impl FromStr for MoodLabel {
    type Err = std::convert::Infallible;

    /// Mood strings come from an external classifier; anything unrecognized
    /// maps to Neutral rather than failing the job.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "happy" => MoodLabel::Happy,
            "sad" => MoodLabel::Sad,
            "calm" => MoodLabel::Calm,
            "romantic" => MoodLabel::Romantic,
            "heartbreak" => MoodLabel::Heartbreak,
            "cyberpunk" => MoodLabel::Cyberpunk,
            "rainy cafe" | "rainy_cafe" | "rainycafe" => MoodLabel::RainyCafe,
            _ => MoodLabel::Neutral,
        })
    }
}

/// User-tweakable mix parameters. Values are clamped on construction so a
/// wild override cannot push a filter out of range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParams {
    pub ambient_vol: f32,
    pub track_vol: f32,
    pub reverb_amount: f32,
    pub playback_speed: f32,
    pub vocal_vol: f32,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            ambient_vol: 0.05,
            track_vol: 2.0,
            reverb_amount: 0.6,
            playback_speed: 0.85,
            vocal_vol: 1.0,
        }
    }
}

/// Optional per-field overrides, merged over a preset or the defaults.
/// Overrides always win.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamOverrides {
    pub ambient_vol: Option<f32>,
    pub track_vol: Option<f32>,
    pub reverb_amount: Option<f32>,
    pub playback_speed: Option<f32>,
    pub vocal_vol: Option<f32>,
}

impl ProcessingParams {
    pub fn clamped(self) -> Self {
        Self {
            ambient_vol: self.ambient_vol.clamp(0.0, 1.0),
            track_vol: self.track_vol.clamp(0.0, 4.0),
            reverb_amount: self.reverb_amount.clamp(0.0, 1.0),
            playback_speed: self.playback_speed.clamp(0.5, 1.2),
            vocal_vol: self.vocal_vol.clamp(0.3, 2.0),
        }
    }

    pub fn with_overrides(self, overrides: &ParamOverrides) -> Self {
        Self {
            ambient_vol: overrides.ambient_vol.unwrap_or(self.ambient_vol),
            track_vol: overrides.track_vol.unwrap_or(self.track_vol),
            reverb_amount: overrides.reverb_amount.unwrap_or(self.reverb_amount),
            playback_speed: overrides.playback_speed.unwrap_or(self.playback_speed),
            vocal_vol: overrides.vocal_vol.unwrap_or(self.vocal_vol),
        }
        .clamped()
    }
}

/// Built-in named presets. Only the fields a preset cares about differ from
/// the defaults.
pub const PRESET_NAMES: &[&str] = &[
    "Late Night Coding",
    "Rainy Cafe",
    "Deep Focus",
    "Heartbreak",
    "Space Drift",
    "Study Mode",
];

pub fn preset(name: &str) -> Option<ProcessingParams> {
    let base = ProcessingParams::default();
    let p = match name {
        "Late Night Coding" => ProcessingParams {
            playback_speed: 0.95,
            ambient_vol: 0.15,
            reverb_amount: 0.2,
            ..base
        },
        "Rainy Cafe" => ProcessingParams {
            playback_speed: 0.92,
            ambient_vol: 0.25,
            reverb_amount: 0.3,
            ..base
        },
        "Deep Focus" => ProcessingParams {
            playback_speed: 0.97,
            ambient_vol: 0.1,
            reverb_amount: 0.1,
            ..base
        },
        "Heartbreak" => ProcessingParams {
            playback_speed: 0.90,
            ambient_vol: 0.3,
            reverb_amount: 0.5,
            ..base
        },
        "Space Drift" => ProcessingParams {
            playback_speed: 0.88,
            ambient_vol: 0.15,
            reverb_amount: 0.6,
            ..base
        },
        "Study Mode" => ProcessingParams {
            playback_speed: 0.95,
            ambient_vol: 0.1,
            reverb_amount: 0.15,
            ..base
        },
        _ => return None,
    };
    Some(p.clamped())
}

/// Lyric/structure hint carried through the pipeline untouched. The mix does
/// not react to it yet; it exists so callers can round-trip their data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureSegment {
    pub start: f32,
    pub end: f32,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mood_defaults_to_neutral() {
        assert_eq!("definitely not a mood".parse::<MoodLabel>().unwrap(), MoodLabel::Neutral);
        assert_eq!("SAD".parse::<MoodLabel>().unwrap(), MoodLabel::Sad);
        assert_eq!("rainy cafe".parse::<MoodLabel>().unwrap(), MoodLabel::RainyCafe);
    }

    #[test]
    fn sad_gets_vinyl_never_rain() {
        use crate::dsp::noise::AmbienceKind;
        assert_eq!(MoodLabel::Sad.ambience(), AmbienceKind::Vinyl);
        assert_eq!(MoodLabel::Heartbreak.ambience(), AmbienceKind::Vinyl);
        assert_eq!(MoodLabel::Calm.ambience(), AmbienceKind::Rain);
        assert_eq!(MoodLabel::RainyCafe.ambience(), AmbienceKind::Rain);
        assert_eq!(MoodLabel::Neutral.ambience(), AmbienceKind::Crackle);
        assert_eq!(MoodLabel::Cyberpunk.ambience(), AmbienceKind::Crackle);
    }

    #[test]
    fn calm_moods_suppress_drums() {
        assert!(MoodLabel::Sad.suppresses_drums());
        assert!(MoodLabel::Calm.suppresses_drums());
        assert!(MoodLabel::Heartbreak.suppresses_drums());
        assert!(!MoodLabel::Happy.suppresses_drums());
        assert!(!MoodLabel::Neutral.suppresses_drums());
    }

    #[test]
    fn overrides_beat_presets() {
        let base = preset("Heartbreak").unwrap();
        assert!((base.playback_speed - 0.90).abs() < 1e-6);

        let merged = base.with_overrides(&ParamOverrides {
            playback_speed: Some(1.05),
            ..Default::default()
        });
        assert!((merged.playback_speed - 1.05).abs() < 1e-6);
        assert!((merged.ambient_vol - 0.3).abs() < 1e-6, "untouched fields keep preset values");
    }

    #[test]
    fn params_are_clamped() {
        let merged = ProcessingParams::default().with_overrides(&ParamOverrides {
            playback_speed: Some(5.0),
            vocal_vol: Some(0.0),
            ..Default::default()
        });
        assert!((merged.playback_speed - 1.2).abs() < 1e-6);
        assert!((merged.vocal_vol - 0.3).abs() < 1e-6);
    }

    #[test]
    fn unknown_preset_is_none() {
        assert!(preset("Polka Madness").is_none());
        for name in PRESET_NAMES {
            assert!(preset(name).is_some(), "{name} should resolve");
        }
    }
}
