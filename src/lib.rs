//! yt-fetch - A Rust CLI tool for downloading YouTube videos and transcripts
//!
//! This library wraps the external `yt-dlp` and `ffmpeg` binaries to fetch a
//! video, its subtitle tracks (converted to plain text), and optionally
//! re-encode the result at a lower size.

pub mod captions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod ffmpeg;
pub mod stream;
pub mod utils;
pub mod ytdlp;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use stream::{run_tool, FileKind, OutputEvent, OutputParser};
pub use ytdlp::VideoMetadata;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the downloader
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    ToolExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("could not parse {0}")]
    Parse(String),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    Validation(String),
}
