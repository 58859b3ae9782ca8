use console::style;
use std::path::{Path, PathBuf};

use super::new_spinner;
use crate::captions::{self, TranscriptSet};
use crate::config::Config;
use crate::ffmpeg::Ffmpeg;
use crate::stream::{FileKind, OutputEvent};
use crate::utils::{format_clock, format_file_size, validate_video_url};
use crate::ytdlp::{find_media_file, MediaRequest, VideoMetadata, YtDlp};
use crate::Result;

/// Everything one `yt download` invocation was asked to do
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub quality: String,
    pub transcripts: bool,
    pub audio_only: bool,
    pub no_video: bool,
    pub convert_subtitles: bool,
    pub compression: bool,
    pub keep_original: bool,
    pub subtitle_languages: Vec<String>,
}

/// Run the full download pipeline.
///
/// The metadata query and the media fetch are fatal on failure; transcript
/// download, subtitle conversion, and compression degrade to warnings and
/// leave earlier artifacts in place.
pub async fn run(config: &Config, request: DownloadRequest, quiet: bool) -> Result<()> {
    let url = validate_video_url(&request.url)?;

    let ytdlp = YtDlp::new(&config.tools.yt_dlp);
    let ffmpeg = Ffmpeg::new(&config.tools.ffmpeg, &config.tools.ffprobe);

    let metadata = fetch_metadata(&ytdlp, &url, quiet).await?;

    fs_err::create_dir_all(&request.output_dir)?;

    let mut media_path = if request.no_video {
        None
    } else {
        download_media(&ytdlp, &url, &request, &metadata, quiet).await?
    };

    let mut transcript_files = Vec::new();
    if request.transcripts {
        transcript_files = download_transcripts(&ytdlp, &url, &request, quiet).await;
    }

    let compress = !request.no_video && !request.audio_only && request.compression;
    if compress {
        if let Some(input) = media_path.clone() {
            match compress_media(&ffmpeg, config, &request, &input, &metadata, quiet).await {
                Ok(compressed) => media_path = Some(compressed),
                Err(e) => {
                    tracing::warn!("compression failed: {e:#}");
                    eprintln!("{} {e:#}", style("Video compression failed:").yellow());
                }
            }
        }
    }

    print_summary(&request.output_dir, media_path.as_deref(), &transcript_files);

    Ok(())
}

async fn fetch_metadata(ytdlp: &YtDlp, url: &str, quiet: bool) -> Result<VideoMetadata> {
    let spinner = new_spinner(quiet);
    spinner.set_message("Fetching video information...");

    let metadata = match ytdlp.fetch_metadata(url).await {
        Ok(metadata) => metadata,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    spinner.finish_and_clear();

    println!(
        "Found video: {} by {}",
        style(&metadata.title).cyan(),
        style(&metadata.uploader).yellow()
    );
    if let Some(duration) = metadata.duration {
        println!("{}", style(format!("Duration: {}", format_clock(duration))).dim());
    }
    println!(
        "{}",
        style(format!("Upload date: {}", metadata.upload_date_display())).dim()
    );

    Ok(metadata)
}

async fn download_media(
    ytdlp: &YtDlp,
    url: &str,
    request: &DownloadRequest,
    metadata: &VideoMetadata,
    quiet: bool,
) -> Result<Option<PathBuf>> {
    let spinner = new_spinner(quiet);
    spinner.set_message(if request.audio_only {
        "Downloading audio..."
    } else {
        "Downloading video..."
    });

    let media_request = MediaRequest {
        output_dir: request.output_dir.clone(),
        quality: request.quality.clone(),
        audio_only: request.audio_only,
    };

    let announced = ytdlp
        .download_media(url, &media_request, |ev| {
            if let OutputEvent::File(FileKind::Media, path) = ev {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    spinner.set_message(format!("Downloading {name}"));
                }
            }
        })
        .await;

    let announced = match announced {
        Ok(announced) => announced,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    spinner.finish_and_clear();

    // yt-dlp does not always announce a usable final path; fall back to
    // scanning the output directory for the video id.
    let media = announced
        .filter(|path| path.is_file())
        .or_else(|| find_media_file(&request.output_dir, &metadata.id, request.audio_only));

    match media {
        Some(path) => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("downloaded file");
            println!(
                "{} {}",
                style(if request.audio_only {
                    "Audio downloaded:"
                } else {
                    "Video downloaded:"
                })
                .green(),
                name
            );
            Ok(Some(path))
        }
        None => {
            // The tool exited cleanly, so treat the missing path as degraded
            // output rather than a failure.
            eprintln!(
                "{}",
                style("Download completed but the file path could not be determined").yellow()
            );
            Ok(None)
        }
    }
}

async fn download_transcripts(
    ytdlp: &YtDlp,
    url: &str,
    request: &DownloadRequest,
    quiet: bool,
) -> Vec<PathBuf> {
    let spinner = new_spinner(quiet);
    spinner.set_message("Downloading transcripts...");

    let downloaded = ytdlp
        .download_subtitles(url, &request.output_dir, &request.subtitle_languages, |_| {})
        .await;
    spinner.finish_and_clear();

    let mut files = match downloaded {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!("transcript download failed: {e:#}");
            eprintln!("{} {e:#}", style("Transcript download failed:").yellow());
            return Vec::new();
        }
    };

    if files.is_empty() {
        eprintln!(
            "{}",
            style("No transcripts available for this video").yellow()
        );
        return files;
    }

    println!("Downloaded {} transcript(s)", files.len());

    if request.convert_subtitles {
        let vtt_files: Vec<PathBuf> = files
            .iter()
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("vtt"))
            .cloned()
            .collect();
        for vtt in vtt_files {
            match captions::convert_file(&vtt) {
                Ok(txt) => files.push(txt),
                Err(e) => {
                    // keep the WebVTT file when conversion fails
                    tracing::warn!("conversion of {} failed: {e:#}", vtt.display());
                    eprintln!(
                        "{} {}: {e:#}",
                        style("Failed to convert").yellow(),
                        vtt.display()
                    );
                }
            }
        }
    }

    let organized = TranscriptSet::classify(files.iter().map(PathBuf::as_path));
    if !organized.is_empty() {
        println!("{}", style("Available transcripts:").blue());
        for (language, tracks) in organized.iter() {
            let manual = if tracks.manual.is_some() { " (manual)" } else { "" };
            let auto = if tracks.auto.is_some() { " (auto)" } else { "" };
            println!("  {}{}{}", style(language).cyan(), manual, auto);
        }
    }

    files
}

async fn compress_media(
    ffmpeg: &Ffmpeg,
    config: &Config,
    request: &DownloadRequest,
    input: &Path,
    metadata: &VideoMetadata,
    quiet: bool,
) -> Result<PathBuf> {
    let spinner = new_spinner(quiet);
    spinner.set_message("Compressing video...");

    let result = async {
        let before = ffmpeg.probe(input).await?;
        let total = metadata.duration.unwrap_or(before.duration);

        let output = ffmpeg
            .compress(
                input,
                &config.compression_settings(),
                request.keep_original,
                |seconds| {
                    if total > 0.0 {
                        spinner.set_message(format!(
                            "Compressing... {} / {}",
                            format_clock(seconds),
                            format_clock(total)
                        ));
                    } else {
                        spinner.set_message(format!("Compressing... {}s processed", seconds as u64));
                    }
                },
            )
            .await?;

        let after = ffmpeg.probe(&output).await?;
        Ok::<_, anyhow::Error>((output, before, after))
    }
    .await;
    spinner.finish_and_clear();

    let (output, before, after) = result?;

    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    println!("{} {}", style("Video compressed:").green(), name);

    if before.size > after.size {
        let saved = before.size - after.size;
        let percent = saved as f64 / before.size as f64 * 100.0;
        println!(
            "{}",
            style(format!(
                "Size reduction: {} ({percent:.1}%)",
                format_file_size(saved)
            ))
            .dim()
        );
    }

    Ok(output)
}

fn print_summary(output_dir: &Path, media_path: Option<&Path>, transcript_files: &[PathBuf]) {
    println!();
    println!("{}", style("✓ Download completed successfully!").green());
    println!(
        "{} {}",
        style("Files saved to:").blue(),
        style(output_dir.display()).cyan()
    );

    if let Some(path) = media_path {
        if let (Some(name), Ok(meta)) = (
            path.file_name().and_then(|n| n.to_str()),
            fs_err::metadata(path),
        ) {
            println!(
                "{}",
                style(format!("Video: {} ({})", name, format_file_size(meta.len()))).dim()
            );
        }
    }

    if !transcript_files.is_empty() {
        println!(
            "{}",
            style(format!("Transcripts: {} files", transcript_files.len())).dim()
        );
    }
}
