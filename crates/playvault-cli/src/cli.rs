//! CLI argument definitions for playvault.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "playvault")]
#[command(about = "Play-history vault and importer", version)]
pub struct Args {
    /// Path to the vault database
    #[arg(long, env = "PLAYVAULT_STORE", default_value = "playvault.db")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import plays from the stable client's binary score ledger
    ImportStable {
        /// Path to the score ledger file
        ledger: PathBuf,
        /// Path to the companion beatmap catalog
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
        /// Stable client songs directory, for resolving beatmap files
        #[arg(long, value_name = "DIR")]
        songs_dir: Option<PathBuf>,
        /// Local player alias (repeatable)
        #[arg(long = "alias")]
        aliases: Vec<String>,
        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import plays from the dynamic client's object store
    ImportDynamic {
        /// Path to the client database file
        database: PathBuf,
        /// Content-addressed blob root (default: <database dir>/files)
        #[arg(long, value_name = "DIR")]
        blobs: Option<PathBuf>,
        /// Local player alias (repeatable; omit to infer)
        #[arg(long = "alias")]
        aliases: Vec<String>,
        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze a replay against its beatmap
    Analyze {
        /// Path to the beatmap file
        beatmap: PathBuf,
        /// Path to the replay file
        replay: PathBuf,
        /// Output the metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent plays
    List {
        /// Maximum number of plays to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored play and beatmap
    Wipe {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}
