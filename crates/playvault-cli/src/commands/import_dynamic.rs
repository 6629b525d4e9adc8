//! Dynamic-store import command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use playvault_core::{ImportConfig, Importer, Store};

use crate::render::format_summary;

pub fn run(
    store_path: &Path,
    database: &Path,
    blobs: Option<PathBuf>,
    aliases: Vec<String>,
    json: bool,
) -> Result<()> {
    // The dynamic client keeps its content-addressed blobs next to the
    // database under "files/".
    let blob_root = blobs.unwrap_or_else(|| {
        database
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("files")
    });

    let store = Store::open(store_path)?;
    let config = ImportConfig {
        aliases,
        songs_dir: None,
    };

    let summary = Importer::new(&store, config).run_dynamic_pass(database, &blob_root);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}
