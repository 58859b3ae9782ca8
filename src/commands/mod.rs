use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub mod download;
pub mod info;

/// Spinner used for long-running pipeline steps
pub(crate) fn new_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
