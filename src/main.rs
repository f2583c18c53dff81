//! Main entry point for the treepack CLI app

use std::process::ExitCode;

use treepack::cli::{self, Commands};
use treepack::{CacheOptions, ExportOptions, Exporter, NavigationCache};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let command = match cli::run() {
        Ok(command) => command,
        Err(e) => e.exit(),
    };

    if let Err(e) = run_app(command) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_app(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List { root, path, sort, filter } => {
            let cache = NavigationCache::with_options(&root, CacheOptions { sort: sort.into() })?;
            if let Some(path) = path {
                cache.enter_path(&path)?;
            }

            let listing = cache.list();
            let entries = match filter {
                Some(query) => cache.search(&query),
                None => listing.entries,
            };

            println!("{}", cache.current_path().display());
            for entry in &entries {
                let md = entry.metadata();
                let size = if md.is_dir { "Directory".to_string() } else { cli::format_size(md.size) };
                let modified = md
                    .modified
                    .map(|t| chrono::DateTime::<chrono::Local>::from(t).format("%b %d %H:%M").to_string())
                    .unwrap_or_default();
                let marker = if md.is_dir { "▸" } else { " " };
                println!("{marker} {:<40} {:>10}  {}", md.name, size, modified);
            }
            if let Some(err) = listing.error {
                eprintln!("warning: {}", err);
            }
        }
        Commands::Export { source, output, workers } => {
            let workers = cli::workers_from_opt_or_env(workers)?;
            let summary = Exporter::new(ExportOptions { workers, ..ExportOptions::default() }).export(&source, &output)?;
            println!(
                "Wrote {} entries ({} files, {} directories, {}) to {} in {:.2?}",
                summary.entries,
                summary.files,
                summary.directories,
                cli::format_size(summary.bytes),
                output.display(),
                summary.elapsed
            );
        }
    }

    Ok(())
}
