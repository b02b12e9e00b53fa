//! Progress bar helpers
//!
//! Bars are hidden when disabled so callers can update them unconditionally.

use indicatif::{ProgressBar, ProgressStyle};

fn bar(total: u64, template: &str, message: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Progress over a known number of units (files, addresses)
pub fn create_progress_bar(total: u64, message: &str, enabled: bool) -> ProgressBar {
    bar(
        total,
        "{msg} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        message,
        enabled,
    )
}

/// Progress over a download of `size` bytes (0 when the server sent no length)
pub fn create_download_progress(size: u64, message: &str, enabled: bool) -> ProgressBar {
    bar(
        size,
        "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        message,
        enabled,
    )
}
