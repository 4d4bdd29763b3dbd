//! Shelf CLI - audiobook library progress.

mod config;
mod render;

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelf_core::{Item, LibraryCommand, RelativePath};
use shelf_progress::{CommandOutcome, Library};
use shelf_storage::JsonStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::config::ShelfConfig;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Audiobook library progress tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Library file
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a folder
    AddFolder {
        /// Folder path
        path: RelativePath,
        /// Parent folder
        #[arg(long)]
        parent: Option<RelativePath>,
        /// Display title
        #[arg(long)]
        title: Option<String>,
    },
    /// Import a book
    AddBook {
        /// Book path
        path: RelativePath,
        /// Length in seconds
        #[arg(long)]
        duration: f64,
        /// Parent folder
        #[arg(long)]
        parent: Option<RelativePath>,
        /// Display title
        #[arg(long)]
        title: Option<String>,
    },
    /// Record a playback position
    Play {
        /// Book path
        path: RelativePath,
        /// Position in seconds
        seconds: f64,
    },
    /// Mark an item finished
    Finish {
        /// Book or folder path
        path: RelativePath,
        /// Clear the finished flag instead
        #[arg(long)]
        undo: bool,
    },
    /// Remove an item and everything below it
    Remove {
        /// Item path
        path: RelativePath,
    },
    /// Move an item to another folder
    Move {
        /// Item path
        path: RelativePath,
        /// New parent; omit to move to the top level
        #[arg(long)]
        to: Option<RelativePath>,
    },
    /// Re-derive folders above an item
    Refresh {
        /// Item path
        path: RelativePath,
    },
    /// Re-derive every folder
    Rebuild,
    /// Show the library tree
    Show {
        /// Only show this item and its subtree
        path: Option<RelativePath>,
    },
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn new_item(
    mut item: Item,
    parent: Option<RelativePath>,
    title: Option<String>,
) -> Item {
    item.parent = parent;
    if let Some(title) = title {
        item.title = title;
    }
    item
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ShelfConfig::load(cli.config.as_deref())?;
    if let Some(library) = cli.library {
        config.library_path = library;
    }
    init_logging(&config.log_level);

    let store = JsonStore::open(&config.library_path)
        .await
        .with_context(|| format!("opening library {}", config.library_path.display()))?;
    let library = Library::new(store, config.library.clone());

    let command = match cli.command {
        Commands::Show { path } => {
            let items = library.items().await?;
            if let Some(path) = &path {
                if library.get(path).await?.is_none() {
                    anyhow::bail!("Not found: {}", path);
                }
            }
            print!("{}", render::render_tree(&items, path.as_ref()));
            return Ok(());
        }
        Commands::AddFolder { path, parent, title } => LibraryCommand::AddItem {
            item: new_item(Item::folder(path), parent, title),
        },
        Commands::AddBook { path, duration, parent, title } => LibraryCommand::AddItem {
            item: new_item(Item::book(path, duration), parent, title),
        },
        Commands::Play { path, seconds } => LibraryCommand::RecordPlayback {
            path,
            current_time: seconds,
        },
        Commands::Finish { path, undo } => LibraryCommand::MarkFinished {
            path,
            finished: !undo,
        },
        Commands::Remove { path } => LibraryCommand::RemoveItem { path },
        Commands::Move { path, to } => LibraryCommand::MoveItem {
            path,
            new_parent: to,
        },
        Commands::Refresh { path } => LibraryCommand::ProgressChanged { path },
        Commands::Rebuild => LibraryCommand::Rebuild,
    };

    let name = command.name();
    let outcome = library.apply(command).await?;
    library.commit(name).await?;

    match &outcome {
        CommandOutcome::Removed { removed, .. } => {
            println!("Removed {} item(s)", removed.len());
        }
        CommandOutcome::Rebuilt(report) => {
            println!("Rebuilt {} folder(s), {} changed", report.folders, report.writes);
        }
        CommandOutcome::Propagated(_) => {
            println!("Updated {} folder(s)", outcome.writes());
        }
    }
    info!(command = name, writes = outcome.writes(), "Done");

    Ok(())
}
