use console::style;

use super::new_spinner;
use crate::config::Config;
use crate::utils::{format_duration, validate_video_url};
use crate::ytdlp::YtDlp;
use crate::Result;

/// Print video metadata without downloading anything
pub async fn run(config: &Config, url: &str, json: bool, quiet: bool) -> Result<()> {
    let url = validate_video_url(url)?;

    let ytdlp = YtDlp::new(&config.tools.yt_dlp);

    let spinner = new_spinner(quiet);
    spinner.set_message("Fetching video information...");
    let metadata = match ytdlp.fetch_metadata(&url).await {
        Ok(metadata) => metadata,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("{}  {}", style("Title:").blue(), metadata.title);
    println!("{}  {}", style("Id:").blue(), metadata.id);
    println!("{}  {}", style("Uploader:").blue(), metadata.uploader);
    if let Some(duration) = metadata.duration {
        println!("{}  {}", style("Duration:").blue(), format_duration(duration));
    }
    println!(
        "{}  {}",
        style("Uploaded:").blue(),
        metadata.upload_date_display()
    );

    Ok(())
}
