use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt_fetch::commands::{self, download::DownloadRequest};
use yt_fetch::utils;
use yt_fetch::{Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "yt_fetch=debug"
    } else {
        "yt_fetch=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    // Check for required external binaries (non-fatal: they may still appear)
    let missing_deps = utils::check_dependencies(&config).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    match cli.command {
        Commands::Download {
            url,
            output,
            quality,
            no_transcript,
            audio_only,
            no_video,
            no_convert_subs,
            no_compression,
            keep_original,
            sub_langs,
        } => {
            let subtitle_languages = match sub_langs {
                Some(langs) => langs
                    .split(',')
                    .map(|lang| lang.trim().to_string())
                    .filter(|lang| !lang.is_empty())
                    .collect(),
                None => config.download.subtitle_languages.clone(),
            };

            let request = DownloadRequest {
                url,
                output_dir: output,
                quality: quality.unwrap_or_else(|| config.download.quality.clone()),
                transcripts: !no_transcript,
                audio_only,
                no_video,
                convert_subtitles: !no_convert_subs && config.download.convert_subtitles,
                compression: !no_compression,
                keep_original,
                subtitle_languages,
            };

            tracing::info!("starting download for {}", request.url);
            commands::download::run(&config, request, cli.quiet).await?;
        }
        Commands::Info { url, json } => {
            commands::info::run(&config, &url, json, cli.quiet).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file directly:");
                if let Some(dir) = dirs::config_dir() {
                    println!("  {}", dir.join("yt-fetch").join("config.yaml").display());
                }
            }
        }
    }

    Ok(())
}
