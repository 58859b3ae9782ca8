use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ffmpeg::CompressionSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// Download defaults
    pub download: DownloadConfig,

    /// Compression defaults
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path or name of the yt-dlp binary
    pub yt_dlp: String,

    /// Path or name of the ffmpeg binary
    pub ffmpeg: String,

    /// Path or name of the ffprobe binary
    pub ffprobe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default format selection (best, worst, or a yt-dlp format string)
    pub quality: String,

    /// Subtitle languages to request; empty requests every available track
    pub subtitle_languages: Vec<String>,

    /// Convert downloaded subtitle tracks to plain text
    pub convert_subtitles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// H.264 constant rate factor (0-51)
    pub crf: u32,

    /// Encoder preset
    pub preset: String,

    /// AAC audio bitrate
    pub audio_bitrate: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                yt_dlp: "yt-dlp".to_string(),
                ffmpeg: "ffmpeg".to_string(),
                ffprobe: "ffprobe".to_string(),
            },
            download: DownloadConfig {
                quality: "best".to_string(),
                subtitle_languages: vec!["en".to_string()],
                convert_subtitles: true,
            },
            compression: CompressionConfig {
                crf: 18,
                preset: "slow".to_string(),
                audio_bitrate: "128k".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("yt-fetch").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.compression.crf > 51 {
            anyhow::bail!(
                "compression.crf must be between 0 and 51, got {}",
                self.compression.crf
            );
        }

        if self.tools.yt_dlp.is_empty() || self.tools.ffmpeg.is_empty() {
            anyhow::bail!("tool paths must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.tools.yt_dlp);
        println!("  ffmpeg: {}", self.tools.ffmpeg);
        println!("  ffprobe: {}", self.tools.ffprobe);
        println!("  Quality: {}", self.download.quality);
        println!(
            "  Subtitle languages: {}",
            if self.download.subtitle_languages.is_empty() {
                "all".to_string()
            } else {
                self.download.subtitle_languages.join(", ")
            }
        );
        println!("  Convert subtitles: {}", self.download.convert_subtitles);
        println!(
            "  Compression: crf {} preset {} audio {}",
            self.compression.crf, self.compression.preset, self.compression.audio_bitrate
        );
    }

    /// Compression settings for the transcoder
    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            crf: self.compression.crf,
            preset: self.compression.preset.clone(),
            audio_bitrate: self.compression.audio_bitrate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_crf_is_rejected() {
        let mut config = Config::default();
        config.compression.crf = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.download.quality, "best");
        assert_eq!(parsed.compression.crf, 18);
    }
}
