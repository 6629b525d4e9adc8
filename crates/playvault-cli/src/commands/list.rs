//! Recent-plays listing command.

use std::path::Path;

use anyhow::Result;
use playvault_core::Store;

use crate::render::format_play;

pub fn run(store_path: &Path, limit: usize, json: bool) -> Result<()> {
    let store = Store::open(store_path)?;
    let plays = store.recent_plays(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plays)?);
        return Ok(());
    }

    if plays.is_empty() {
        println!("no plays stored");
        return Ok(());
    }
    for play in &plays {
        println!("{}", format_play(play));
    }
    Ok(())
}
