mod cli;
mod commands;
mod render;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("playvault=warn,playvault_core=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match args.command {
        Command::ImportStable {
            ledger,
            catalog,
            songs_dir,
            aliases,
            json,
        } => commands::import_stable::run(
            &args.store,
            &ledger,
            catalog.as_deref(),
            songs_dir,
            aliases,
            json,
        ),
        Command::ImportDynamic {
            database,
            blobs,
            aliases,
            json,
        } => commands::import_dynamic::run(&args.store, &database, blobs, aliases, json),
        Command::Analyze {
            beatmap,
            replay,
            json,
        } => commands::analyze::run(&beatmap, &replay, json),
        Command::List { limit, json } => commands::list::run(&args.store, limit, json),
        Command::Wipe { yes } => commands::wipe::run(&args.store, yes),
    }
}
