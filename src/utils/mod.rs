use anyhow::Result;
use url::Url;

use crate::config::Config;
use crate::FetchError;

/// Check that a URL points at YouTube, tolerating a missing scheme.
///
/// Returns the normalized URL string. Anything else is rejected before a
/// single child process is spawned.
pub fn validate_video_url(input: &str) -> Result<String> {
    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let parsed = Url::parse(&candidate)
        .map_err(|_| FetchError::Validation(format!("invalid URL: {input}")))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| FetchError::Validation(format!("URL has no host: {input}")))?;

    if !is_youtube_host(host) {
        return Err(FetchError::Validation(format!(
            "not a YouTube URL: {input}"
        ))
        .into());
    }

    if parsed.path().len() <= 1 && parsed.query().is_none() {
        return Err(FetchError::Validation(format!(
            "URL does not point at a video: {input}"
        ))
        .into());
    }

    Ok(parsed.to_string())
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtube.com"
        || host == "youtu.be"
        || host == "m.youtube.com"
        || host.ends_with(".youtube.com")
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format duration as a m:ss clock, the form used in the download summary
pub fn format_clock(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Check if the current environment has the required external tools
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.tools.yt_dlp).await {
        missing.push(format!(
            "{} - required for downloading videos and transcripts",
            config.tools.yt_dlp
        ));
    }

    if !check_command_available(&config.tools.ffmpeg).await {
        missing.push(format!(
            "{} - required for video compression",
            config.tools.ffmpeg
        ));
    }

    if !check_command_available(&config.tools.ffprobe).await {
        missing.push(format!(
            "{} - recommended for media file inspection",
            config.tools.ffprobe
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(65.0), "1:05");
        assert_eq!(format_clock(600.0), "10:00");
        assert_eq!(format_clock(9.0), "0:09");
    }

    #[test]
    fn accepts_common_youtube_url_forms() {
        assert!(validate_video_url("https://www.youtube.com/watch?v=abc123").is_ok());
        assert!(validate_video_url("https://youtu.be/abc123").is_ok());
        assert!(validate_video_url("www.youtube.com/watch?v=abc123").is_ok());
        assert!(validate_video_url("https://m.youtube.com/watch?v=abc123").is_ok());
    }

    #[test]
    fn rejects_non_youtube_urls() {
        assert!(validate_video_url("https://example.com/watch?v=abc").is_err());
        assert!(validate_video_url("not a url at all").is_err());
        assert!(validate_video_url("https://youtube.com/").is_err());
    }
}
