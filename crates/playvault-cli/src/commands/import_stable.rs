//! Stable-ledger import command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use playvault_core::{ImportConfig, Importer, Store};

use crate::render::format_summary;

pub fn run(
    store_path: &Path,
    ledger: &Path,
    catalog: Option<&Path>,
    songs_dir: Option<PathBuf>,
    aliases: Vec<String>,
    json: bool,
) -> Result<()> {
    let store = Store::open(store_path)?;
    let config = ImportConfig { aliases, songs_dir };

    let summary = Importer::new(&store, config).run_stable_pass(ledger, catalog);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}
