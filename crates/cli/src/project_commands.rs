use std::path::{self, PathBuf};

use {
    anyhow::{Context, Result},
    clap::{Subcommand, ValueEnum},
    paraman_projects::{ModelEvent, PathKey, ProjectModel, SubdirectoryEntry},
    tokio::sync::broadcast::error::RecvError,
    tracing::debug,
};

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Show the projects directory, archive directory and current projects.
    Status,
    /// List the projects in the projects directory.
    List,
    /// Choose the projects directory to track.
    Select {
        /// Directory whose subdirectories are projects.
        dir: PathBuf,
    },
    /// Choose the directory finished projects are moved into.
    ArchiveTo {
        /// Archive directory.
        dir: PathBuf,
    },
    /// Move a project into the archive directory.
    Archive {
        /// Position of the project as shown by `paraman list`.
        index: usize,
    },
    /// Forget a remembered directory.
    Forget {
        #[arg(value_enum)]
        which: StoredDirectory,
    },
    /// Keep following the projects directory and reprint it on every change.
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StoredDirectory {
    /// The projects directory.
    Watched,
    /// The archive directory.
    Archive,
}

impl From<StoredDirectory> for PathKey {
    fn from(which: StoredDirectory) -> Self {
        match which {
            StoredDirectory::Watched => Self::WatchedDirectory,
            StoredDirectory::Archive => Self::ArchiveDestination,
        }
    }
}

pub async fn handle_projects(ctx: &AppContext, action: ProjectAction) -> Result<()> {
    let model = &ctx.model;
    match action {
        ProjectAction::Status => {
            print_status(model);
            Ok(())
        },
        ProjectAction::List => {
            if model.watched_directory().is_none() {
                eprintln!("No projects directory selected. Run `paraman select <DIR>` first.");
            } else {
                print_listing(&model.current_listing());
            }
            Ok(())
        },
        ProjectAction::Select { dir } => {
            let dir = path::absolute(&dir)
                .with_context(|| format!("cannot resolve {}", dir.display()))?;
            model.select_watched_directory(&dir).await?;
            println!("Tracking {}", dir.display());
            print_listing(&model.current_listing());
            Ok(())
        },
        ProjectAction::ArchiveTo { dir } => {
            let dir = path::absolute(&dir)
                .with_context(|| format!("cannot resolve {}", dir.display()))?;
            model.select_archive_destination(&dir).await?;
            println!("Archiving into {}", dir.display());
            Ok(())
        },
        ProjectAction::Archive { index } => {
            let destination = model.archive_entry(index).await?;
            println!("Archived to {}", destination.display());
            print_listing(&model.current_listing());
            Ok(())
        },
        ProjectAction::Forget { which } => {
            let key = PathKey::from(which);
            model.forget(key).await?;
            println!("Forgot {key}");
            Ok(())
        },
        ProjectAction::Watch => watch(model).await,
    }
}

async fn watch(model: &ProjectModel) -> Result<()> {
    let Some(dir) = model.watched_directory() else {
        eprintln!("No projects directory selected. Run `paraman select <DIR>` first.");
        return Ok(());
    };

    let mut events = model.subscribe();
    println!("Following {} (Ctrl-C to stop)", dir.display());
    if !model.is_watching() {
        eprintln!("Change notifications are unavailable; the listing will not update.");
    }
    print_listing(&model.current_listing());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(ModelEvent::ListingChanged) | Err(RecvError::Lagged(_)) => {
                    println!();
                    print_listing(&model.current_listing());
                },
                Ok(ModelEvent::ArchiveCompleted { source, destination }) => {
                    println!("Archived {} to {}", source.display(), destination.display());
                },
                Ok(ModelEvent::WatchUnavailable { path }) => {
                    eprintln!("Cannot watch {}; the listing will not update.", path.display());
                },
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("stopped following projects directory");
    Ok(())
}

fn print_status(model: &ProjectModel) {
    let snapshot = model.snapshot();
    match snapshot.watched_directory {
        Some(ref dir) if snapshot.watching => println!("Projects: {}", dir.display()),
        Some(ref dir) => println!("Projects: {} (not watching)", dir.display()),
        None => println!("Projects: (not selected)"),
    }
    match snapshot.archive_destination {
        Some(ref dir) => println!("Archive:  {}", dir.display()),
        None => println!("Archive:  (not selected)"),
    }
    if snapshot.watched_directory.is_some() {
        println!();
        print_listing(&snapshot.listing);
    }
}

fn print_listing(listing: &[SubdirectoryEntry]) {
    print!("{}", render_listing(listing));
}

fn render_listing(listing: &[SubdirectoryEntry]) -> String {
    if listing.is_empty() {
        return "No projects.\n".to_string();
    }
    let width = (listing.len() - 1).to_string().len();
    listing
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("  {i:>width$}  {}\n", entry.name))
        .collect()
}
