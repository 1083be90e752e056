// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use medsync::{import_csv, init_logging, Cli, Collection, Command, Config, Language, SqliteStore};
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_args(&cli.store);

    match cli.command {
        Some(Command::Import { collection, csv, replace }) => {
            init_logging(&config);
            run_import(&config, collection, &csv, replace)
        }
        Some(Command::Browse { language }) => run_ui_mode(&config, language),
        None => run_ui_mode(&config, Language::default()),
    }
}

fn run_import(config: &Config, collection: Collection, csv: &Path, replace: bool) -> Result<()> {
    let target = config.collection_name(collection);
    println!("Importing {} into '{}'", csv.display(), target);

    // 1. Parse the export
    let report = import_csv(csv, collection)
        .with_context(|| format!("Failed to import {}", csv.display()))?;
    println!(
        "✓ Parsed {} records (header on row {}, {} skipped)",
        report.documents.len(),
        report.header_row + 1,
        report.skipped
    );

    // 2. Open store
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    if replace {
        let removed = store.clear(target)?;
        info!(removed, collection = target, "cleared collection before import");
    }

    // 3. Write documents
    let written = store
        .upsert(target, &report.documents)
        .context("Failed to write documents")?;

    // 4. Verify count
    let count = store.count(target)?;
    println!("✓ Wrote {} documents; '{}' now holds {}", written, target, count);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, language: Language) -> Result<()> {
    use medsync::{Catalog, CatalogHook, CollectionState, Session};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let mut log_path = config.db_path.clone().into_os_string();
    log_path.push(".log");
    medsync::init_file_logging(config, Path::new(&log_path))?;

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let dirty = Arc::new(AtomicBool::new(true));
    let flag = dirty.clone();
    let hook: CatalogHook = Arc::new(move |_: Collection, _: &CollectionState| {
        flag.store(true, Ordering::SeqCst)
    });

    let mut catalog = Catalog::with_hook(Some(Arc::new(store.clone())), config, Some(hook));
    catalog.start();

    let mut app = ui::App::new(catalog, Session::new(language), Some(store), dirty);
    ui::run_ui(&mut app, config.poll_interval)?;

    app.catalog.stop();
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _language: Language) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin medsync-server --features server");
    std::process::exit(1);
}
