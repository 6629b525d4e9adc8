//! Console output formatting with colored display.

use owo_colors::OwoColorize;
use playvault_core::{ImportSummary, Play};

/// One-line colored import summary.
pub fn format_summary(summary: &ImportSummary) -> String {
    if let Some(error) = &summary.error {
        return format!("{} {}", "import failed:".red().bold(), error);
    }
    format!(
        "{} added, {} skipped, {} beatmaps",
        summary.added.to_string().green().bold(),
        summary.skipped.to_string().yellow(),
        summary.beatmaps
    )
}

/// One play per line: timestamp, score, accuracy, mods, hash.
pub fn format_play(play: &Play) -> String {
    let accuracy = format!("{:.2}%", play.accuracy() * 100.0);
    let mods = play.mods.to_display();
    let pp = if play.pp > 0.0 {
        format!("{:.0}pp", play.pp).cyan().to_string()
    } else {
        "-".dimmed().to_string()
    };
    format!(
        "{}  {:>9}  {:>7}  {:>6}  {}  {}",
        play.timestamp.format("%Y-%m-%d %H:%M"),
        play.score.to_string().bold(),
        accuracy,
        pp,
        mods,
        play.beatmap_hash.dimmed()
    )
}
