//! musepipe CLI.
//!
//! ```text
//! musepipe text  "<idea>"      [out.wav]
//! musepipe image <image-path>  [out.wav]
//! musepipe transcribe <in.wav> [out.json]
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use musepipe::config::Settings;
use musepipe::output;
use musepipe::pipeline::{CancelToken, MusicRequest, Orchestrator, PipelineReport};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("falling back to default settings: {e:#}");
            Settings::default()
        }
    };
    let orchestrator = Orchestrator::from_settings(&settings);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("text") => {
            let idea = args.get(1).context(USAGE)?;
            let out = arg_path(&args, 2, "out.wav");
            let report = orchestrator
                .run_music(MusicRequest::from_text(idea), &CancelToken::never())
                .await;
            let music = unwrap_report(report)?;
            output::write_wav(&out, &music.audio)?;
            log::info!("wrote {}", out.display());
        }
        Some("image") => {
            let image_path = args.get(1).context(USAGE)?;
            let out = arg_path(&args, 2, "out.wav");
            let bytes = std::fs::read(image_path)
                .with_context(|| format!("failed to read image {image_path}"))?;
            let mime = image_mime(Path::new(image_path));
            let report = orchestrator
                .run_music(MusicRequest::from_image(bytes, mime), &CancelToken::never())
                .await;
            let music = unwrap_report(report)?;
            output::write_wav(&out, &music.audio)?;
            log::info!("wrote {}", out.display());
        }
        Some("transcribe") => {
            let wav_path = args.get(1).context(USAGE)?;
            let out = arg_path(&args, 2, "notes.json");
            let audio = output::read_wav(Path::new(wav_path))?;
            let report = orchestrator
                .run_transcription(audio, &CancelToken::never())
                .await;
            let result = unwrap_report(report)?;
            log::info!(
                "transcribed {} notes (confidence {:.2})",
                result.notes.len(),
                result.confidence
            );
            output::write_note_track(&out, &result.to_track())?;
            log::info!("wrote {}", out.display());
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

const USAGE: &str = "usage: musepipe text \"<idea>\" [out.wav]\n       \
                     musepipe image <image-path> [out.wav]\n       \
                     musepipe transcribe <in.wav> [out.json]";

fn arg_path(args: &[String], index: usize, default: &str) -> PathBuf {
    args.get(index)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn image_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn unwrap_report<T>(report: PipelineReport<T>) -> Result<T> {
    match report.output {
        Some(output) => Ok(output),
        None => bail!(
            "request failed: {}",
            report.failure_reason().unwrap_or("unknown failure")
        ),
    }
}
