use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::stream::{run_tool, OutputEvent, OutputParser};
use crate::{FetchError, Result};

/// Re-encoding parameters for the compression pass
#[derive(Debug, Clone)]
pub struct CompressionSettings {
    /// H.264 constant rate factor; 18 is visually lossless
    pub crf: u32,
    /// Encoder preset, slower presets compress better
    pub preset: String,
    /// AAC audio bitrate, e.g. "128k"
    pub audio_bitrate: String,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "slow".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Probed facts about a local media file
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Transcoder backed by the external ffmpeg and ffprobe binaries
pub struct Ffmpeg {
    program: String,
    probe_program: String,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>, probe_program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_program: probe_program.into(),
        }
    }

    /// Re-encode a video at lower size, reporting elapsed seconds as ffmpeg
    /// makes progress.
    ///
    /// The output lands next to the input as `<stem>_compressed.mp4`. On
    /// success the original is removed unless `keep_original` is set; the
    /// output must exist and be non-empty or the pass is treated as failed.
    pub async fn compress<F>(
        &self,
        input: &Path,
        settings: &CompressionSettings,
        keep_original: bool,
        mut on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(f64),
    {
        if !input.is_file() {
            return Err(
                FetchError::Validation(format!("input file not found: {}", input.display()))
                    .into(),
            );
        }

        let output = compressed_filename(input);
        let crf = settings.crf.to_string();

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-i",
            &input.to_string_lossy(),
            "-c:v",
            "libx264",
            "-crf",
            &crf,
            "-preset",
            &settings.preset,
            "-c:a",
            "aac",
            "-b:a",
            &settings.audio_bitrate,
            "-movflags",
            "+faststart",
            "-y",
            &output.to_string_lossy(),
        ]);

        run_tool(&self.program, cmd, OutputParser::new(false), |ev| {
            if let OutputEvent::Progress(seconds) = ev {
                on_progress(*seconds);
            }
        })
        .await?;

        let written = fs_err::metadata(&output)?;
        if written.len() == 0 {
            return Err(FetchError::Parse(format!(
                "compressed output is empty: {}",
                output.display()
            ))
            .into());
        }

        if !keep_original {
            fs_err::remove_file(input)?;
            tracing::debug!("removed original file {}", input.display());
        }

        Ok(output)
    }

    /// Probe a local media file with ffprobe
    pub async fn probe(&self, path: &Path) -> Result<ClipInfo> {
        let size = fs_err::metadata(path)?.len();

        let mut cmd = Command::new(&self.probe_program);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            &path.to_string_lossy(),
        ]);

        let run = run_tool(&self.probe_program, cmd, OutputParser::new(true), |_| {}).await?;

        let json = run
            .json()
            .cloned()
            .ok_or_else(|| FetchError::Parse("ffprobe output: no JSON document".into()))?;

        parse_probe(json, size)
    }

    /// Check if ffmpeg is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Derive the compressed sibling path: `<stem>_compressed.mp4`
pub fn compressed_filename(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_compressed.mp4"))
}

fn parse_probe(json: serde_json::Value, size: u64) -> Result<ClipInfo> {
    let doc: ProbeDocument = serde_json::from_value(json)
        .map_err(|e| FetchError::Parse(format!("ffprobe output: {e}")))?;

    let duration = doc
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // Audio-only files have no video stream; report zero dimensions rather
    // than failing so post-download summaries work for audio fetches too.
    let video = doc
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"));

    Ok(ClipInfo {
        duration,
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_filename_is_an_mp4_sibling() {
        assert_eq!(
            compressed_filename(Path::new("/tmp/example.webm")),
            PathBuf::from("/tmp/example_compressed.mp4")
        );
        assert_eq!(
            compressed_filename(Path::new("/tmp/video.mp4")),
            PathBuf::from("/tmp/video_compressed.mp4")
        );
    }

    #[test]
    fn probe_document_parses_dimensions_and_duration() {
        let json = serde_json::json!({
            "streams": [
                { "codec_type": "audio" },
                { "codec_type": "video", "width": 1920, "height": 1080 },
            ],
            "format": { "duration": "42.5" },
        });
        let info = parse_probe(json, 123_456).unwrap();
        assert_eq!(
            info,
            ClipInfo {
                duration: 42.5,
                width: 1920,
                height: 1080,
                size: 123_456,
            }
        );
    }

    #[test]
    fn probe_document_without_video_stream_reports_zero_dimensions() {
        let json = serde_json::json!({
            "streams": [{ "codec_type": "audio" }],
            "format": { "duration": "30.0" },
        });
        let info = parse_probe(json, 10).unwrap();
        assert_eq!(info.width, 0);
        assert_eq!(info.height, 0);
        assert_eq!(info.duration, 30.0);
    }

    #[tokio::test]
    async fn compress_rejects_a_missing_input() {
        let ffmpeg = Ffmpeg::new("ffmpeg", "ffprobe");
        let err = ffmpeg
            .compress(
                Path::new("/nonexistent/input.mp4"),
                &CompressionSettings::default(),
                true,
                |_| {},
            )
            .await
            .unwrap_err();
        let fetch = err.downcast_ref::<FetchError>().expect("typed error");
        assert!(matches!(fetch, FetchError::Validation(_)));
    }
}
