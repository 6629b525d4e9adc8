//! Standalone replay analysis command.

use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use playvault_core::replay;

pub fn run(beatmap: &Path, replay_path: &Path, json: bool) -> Result<()> {
    let analysis = replay::analyze(beatmap, replay_path);

    if json {
        let value = serde_json::json!({
            "unstable_rate": analysis.unstable_rate,
            "key_balance": analysis.key_balance,
            "hits": analysis.offsets.len(),
            "press_counts": analysis.press_counts,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if analysis.is_neutral() {
        println!("{}", "no hits could be analyzed".yellow());
        return Ok(());
    }

    println!(
        "UR {}  balance {:.2}  ({} hits matched)",
        format!("{:.1}", analysis.unstable_rate).bold(),
        analysis.key_balance,
        analysis.offsets.len()
    );
    println!(
        "presses  K1 {}  K2 {}  M1 {}  M2 {}",
        analysis.press_counts[0],
        analysis.press_counts[1],
        analysis.press_counts[2],
        analysis.press_counts[3]
    );
    Ok(())
}
