use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "yt",
    about = "Download YouTube videos and transcripts with optional compression",
    version,
    long_about = "A CLI tool that wraps yt-dlp and ffmpeg to fetch a video, its subtitle \
tracks (converted to plain text), and optionally re-encode the result at a lower size."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a video, its transcripts, and compress the result
    Download {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Video quality (best, worst, or a yt-dlp format string)
        #[arg(long, value_name = "QUALITY")]
        quality: Option<String>,

        /// Skip downloading transcripts
        #[arg(short = 't', long)]
        no_transcript: bool,

        /// Download audio only
        #[arg(short = 'a', long)]
        audio_only: bool,

        /// Skip the video/audio download, fetch transcripts only
        #[arg(long, conflicts_with = "audio_only")]
        no_video: bool,

        /// Keep subtitles in WebVTT form instead of converting to plain text
        #[arg(long)]
        no_convert_subs: bool,

        /// Skip video compression
        #[arg(long)]
        no_compression: bool,

        /// Keep the original downloaded file after compression
        #[arg(long)]
        keep_original: bool,

        /// Comma-separated subtitle languages (e.g. "en,de"); overrides config
        #[arg(long, value_name = "LANGS")]
        sub_langs: Option<String>,
    },

    /// Show video metadata without downloading
    Info {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or edit the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
