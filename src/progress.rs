use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{msg} ({pos}/{len})\n[{bar:40.cyan/blue}] {percent}% • {elapsed_precise} (ETA: {eta})";

/// Progress bar for `len` work items, hidden when `enabled` is false.
pub fn create_progress_bar(len: u64, title: impl Into<String>, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    ProgressBar::new(len)
        .with_message(title.into())
        .with_style(style)
}
