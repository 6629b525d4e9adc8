//! Full-wipe command.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use playvault_core::Store;

pub fn run(store_path: &Path, yes: bool) -> Result<()> {
    let store = Store::open(store_path)?;
    let count = store.play_count()?;

    if !yes {
        print!(
            "{} delete {count} stored plays? [y/N] ",
            "this cannot be undone:".red().bold()
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y") {
            println!("aborted");
            return Ok(());
        }
    }

    store.wipe()?;
    println!("wiped {count} plays");
    Ok(())
}
