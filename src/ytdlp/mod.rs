use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::stream::{run_tool, FileKind, OutputEvent, OutputParser};
use crate::{FetchError, Result};

/// Metadata for one video, parsed from yt-dlp's JSON dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    /// Duration in seconds; absent for live streams
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: String,
    /// Upload date in yt-dlp's YYYYMMDD form
    #[serde(default)]
    pub upload_date: String,
}

impl VideoMetadata {
    /// Upload date formatted for display, falling back to the raw value
    pub fn upload_date_display(&self) -> String {
        NaiveDate::parse_from_str(&self.upload_date, "%Y%m%d")
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| self.upload_date.clone())
    }
}

/// What to fetch from a video URL
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub output_dir: PathBuf,
    pub quality: String,
    pub audio_only: bool,
}

/// Video downloader backed by the external yt-dlp binary
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Query video metadata without downloading anything
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        tracing::debug!("fetching metadata for {}", url);

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--ignore-config",
            "--dump-json",
            "--no-download",
            "--no-write-sub",
            "--no-write-auto-sub",
            url,
        ]);

        let run = run_tool(&self.program, cmd, OutputParser::new(true), |_| {}).await?;

        let json = run
            .json()
            .ok_or_else(|| FetchError::Parse("video metadata: no JSON document".into()))?;

        let metadata: VideoMetadata = serde_json::from_value(json.clone())
            .map_err(|e| FetchError::Parse(format!("video metadata: {e}")))?;

        Ok(metadata)
    }

    /// Download the video (or audio-only) stream.
    ///
    /// Returns the media path announced on yt-dlp's output, if any; callers
    /// fall back to [`find_media_file`] when the announcement was missed.
    pub async fn download_media<F>(
        &self,
        url: &str,
        request: &MediaRequest,
        on_event: F,
    ) -> Result<Option<PathBuf>>
    where
        F: FnMut(&OutputEvent),
    {
        let template = request.output_dir.join("%(title)s [%(id)s].%(ext)s");
        let format = if request.audio_only {
            "bestaudio/best".to_string()
        } else if request.quality == "best" {
            "best[ext=mp4]/best".to_string()
        } else {
            request.quality.clone()
        };

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--ignore-config",
            "--format",
            &format,
            "--output",
            &template.to_string_lossy(),
            "--embed-metadata",
            "--write-info-json",
            "--newline",
        ]);
        if request.audio_only {
            cmd.args(["--extract-audio", "--audio-format", "mp3"]);
        }
        cmd.arg(url);

        let run = run_tool(&self.program, cmd, OutputParser::new(false), on_event).await?;

        // The last announcement wins: a merge step replaces the per-format
        // destination files with the final container.
        let media = run.files(FileKind::Media).last().map(Path::to_path_buf);
        Ok(media)
    }

    /// Download subtitle tracks only, in WebVTT form.
    ///
    /// Returns the announced subtitle paths in the order yt-dlp wrote them.
    pub async fn download_subtitles<F>(
        &self,
        url: &str,
        output_dir: &Path,
        languages: &[String],
        on_event: F,
    ) -> Result<Vec<PathBuf>>
    where
        F: FnMut(&OutputEvent),
    {
        let template = output_dir.join("%(title)s [%(id)s]");

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--ignore-config",
            "--write-sub",
            "--write-auto-sub",
            "--sub-format",
            "vtt",
            "--skip-download",
            "--output",
            &template.to_string_lossy(),
        ]);
        if !languages.is_empty() {
            cmd.args(["--sub-langs", &languages.join(",")]);
        }
        cmd.arg(url);

        let run = run_tool(&self.program, cmd, OutputParser::new(false), on_event).await?;

        let files: Vec<PathBuf> = run
            .events
            .iter()
            .filter_map(|ev| match ev {
                OutputEvent::File(FileKind::TimedText | FileKind::PlainText, path) => {
                    Some(path.clone())
                }
                _ => None,
            })
            .collect();

        Ok(files)
    }
}

/// Scan a directory for the downloaded media file containing the video id.
///
/// Fallback for when no usable path was announced on yt-dlp's output.
pub fn find_media_file(dir: &Path, video_id: &str, audio_only: bool) -> Option<PathBuf> {
    const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];
    const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "webm"];

    let wanted = if audio_only {
        AUDIO_EXTENSIONS
    } else {
        VIDEO_EXTENSIONS
    };

    let entries = fs_err::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if name.contains(video_id) && wanted.contains(&ext) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parses_from_a_dump_json_document() {
        let json = serde_json::json!({
            "id": "a",
            "title": "T",
            "duration": 10,
            "uploader": "U",
            "upload_date": "20240101",
            "extractor": "youtube",
        });
        let metadata: VideoMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(metadata.id, "a");
        assert_eq!(metadata.title, "T");
        assert_eq!(metadata.duration, Some(10.0));
        assert_eq!(metadata.uploader, "U");
        assert_eq!(metadata.upload_date, "20240101");
    }

    #[test]
    fn upload_date_is_formatted_for_display() {
        let metadata = VideoMetadata {
            id: "a".into(),
            title: "T".into(),
            duration: Some(10.0),
            uploader: "U".into(),
            upload_date: "20240101".into(),
        };
        assert_eq!(metadata.upload_date_display(), "2024-01-01");
    }

    #[test]
    fn find_media_file_matches_the_video_id() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("Other [zzz].mp4"), b"x").unwrap();
        fs_err::write(dir.path().join("Video [abc123].mp4"), b"x").unwrap();
        fs_err::write(dir.path().join("Video [abc123].en.vtt"), b"x").unwrap();

        let found = find_media_file(dir.path(), "abc123", false).unwrap();
        assert_eq!(found, dir.path().join("Video [abc123].mp4"));
        assert!(find_media_file(dir.path(), "missing", false).is_none());
    }

    #[test]
    fn find_media_file_prefers_audio_extensions_when_audio_only() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("Video [abc].mp3"), b"x").unwrap();

        assert!(find_media_file(dir.path(), "abc", false).is_none());
        assert!(find_media_file(dir.path(), "abc", true).is_some());
    }
}
