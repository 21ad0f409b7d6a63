//! ffmpeg subprocess plumbing. The engine renders waveforms; ffmpeg turns
//! them into deliverables: a 320k mp3, a pcm wav decoded from that mp3, and
//! a still-image video whose audio track is the mp3 payload copied bit for
//! bit, so all artifacts carry the same mastered audio.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::audio::signal::AudioSignal;
use crate::engine::params::MoodLabel;

/// How the video ended up being encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoEncode {
    /// Full VHS-style filter graph.
    Cinematic,
    /// Plain still-image encode after the filter graph failed.
    Simple,
}

fn run_ffmpeg(args: &[String]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg exited with error:\n{}", stderr);
    }
    Ok(())
}

/// Encode the mastered signal to a 320 kbps mp3 by piping raw f32 samples.
pub fn export_mp3(signal: &AudioSignal, output: &Path) -> Result<()> {
    let args: Vec<String> = vec![
        "-y".into(),
        "-f".into(), "f32le".into(),
        "-ar".into(), signal.sample_rate.to_string(),
        "-ac".into(), "1".into(),
        "-i".into(), "pipe:0".into(),
        "-b:a".into(), "320k".into(),
        output.to_string_lossy().into_owned(),
    ];

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

    {
        let stdin = child.stdin.as_mut().context("ffmpeg stdin not available")?;
        let mut writer = std::io::BufWriter::new(stdin);
        for sample in &signal.samples {
            writer.write_all(&sample.to_le_bytes()).context("Failed to write samples to ffmpeg")?;
        }
        writer.flush()?;
    }
    drop(child.stdin.take());

    let output_status = child.wait_with_output().context("Failed to wait for ffmpeg")?;
    if !output_status.status.success() {
        let stderr = String::from_utf8_lossy(&output_status.stderr);
        anyhow::bail!("ffmpeg mp3 encode failed:\n{}", stderr);
    }

    log::info!("Exported mp3: {}", output.display());
    Ok(())
}

/// Decode the mp3 back to a 16-bit wav so the wav carries exactly the same
/// mastered payload as the lossy artifact.
pub fn export_wav_from_mp3(mp3: &Path, wav: &Path) -> Result<()> {
    let args: Vec<String> = vec![
        "-y".into(),
        "-i".into(), mp3.to_string_lossy().into_owned(),
        "-acodec".into(), "pcm_s16le".into(),
        wav.to_string_lossy().into_owned(),
    ];
    run_ffmpeg(&args).context("ffmpeg wav export failed")?;
    log::info!("Exported wav: {}", wav.display());
    Ok(())
}

fn video_args(mp3: &Path, image: &Path, output: &Path, filter: &str) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(), "1".into(),
        "-framerate".into(), "1".into(),
        "-i".into(), image.to_string_lossy().into_owned(),
        "-i".into(), mp3.to_string_lossy().into_owned(),
        "-vf".into(), filter.to_string(),
        "-c:v".into(), "libx264".into(),
        "-tune".into(), "stillimage".into(),
        "-pix_fmt".into(), "yuv420p".into(),
        // Copy the mp3 stream untouched: video audio == mp3 artifact.
        "-c:a".into(), "copy".into(),
        "-shortest".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Mux the mp3 with a looping background still. Tries the cinematic VHS
/// filter graph first; if that fails, degrades to a plain encode rather
/// than failing the job.
pub fn mux_video(mp3: &Path, image: &Path, output: &Path, mood: MoodLabel) -> Result<VideoEncode> {
    let mut filter = String::from(
        "scale=1280:720,noise=alls=35:allf=t+p,curves=preset=vintage,\
         scale=trunc(iw/2)*2:trunc(ih/2)*2",
    );
    if mood == MoodLabel::Cyberpunk {
        filter.push_str(",hue=h=20:s=1.2");
    }

    match run_ffmpeg(&video_args(mp3, image, output, &filter)) {
        Ok(()) => {
            log::info!("Exported video: {} (cinematic)", output.display());
            Ok(VideoEncode::Cinematic)
        }
        Err(e) => {
            log::warn!("Cinematic video encode failed ({e:#}), retrying with simple encode");
            run_ffmpeg(&video_args(mp3, image, output, "scale=trunc(iw/2)*2:trunc(ih/2)*2"))
                .context("simple video encode failed too")?;
            log::info!("Exported video: {} (simple)", output.display());
            Ok(VideoEncode::Simple)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn video_args_copy_audio_stream() {
        let args = video_args(
            &PathBuf::from("a.mp3"),
            &PathBuf::from("bg.png"),
            &PathBuf::from("out.mp4"),
            "scale=1280:720",
        );
        let joined = args.join(" ");
        assert!(joined.contains("-c:a copy"), "audio must be stream-copied: {joined}");
        assert!(joined.contains("-tune stillimage"));
        assert!(joined.ends_with("out.mp4"));
    }
}
