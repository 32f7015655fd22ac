//! Command-line front end over `jotter_core`.
//!
//! # Responsibility
//! - Resolve a store configuration from flags or a config file.
//! - Map each subcommand onto one store operation.
//! - Report failures with the store's user-facing message.

use clap::{Args, Parser, Subcommand};
use jotter_core::{
    default_log_level, init_logging, BlobNoteRepository, EditorSession, NewNote, NoteField,
    NoteId, NoteQuery, NotesStore, QueryOptions, SaveOutcome, SortField, SortOrder,
    StorageBackend, StoreConfig, StoreError,
};
use log::warn;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliStore = NotesStore<BlobNoteRepository<StorageBackend>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "jotter: local note keeping", long_about = None)]
struct Cli {
    /// JSON store configuration file.
    #[arg(long, global = true, conflicts_with_all = ["db", "dir"])]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true, conflicts_with = "dir")]
    db: Option<PathBuf>,

    /// Directory for file-per-key storage.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Write rolling logs into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List notes.
    List(ListArgs),
    /// Create a note.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Print one note.
    Show { id: NoteId },
    /// Change title and/or content of a note.
    Edit {
        id: NoteId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note.
    Rm { id: NoteId },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Sort field: title, created or updated.
    #[arg(long)]
    sort: Option<SortField>,

    /// Sort descending.
    #[arg(long, requires = "sort")]
    desc: bool,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    skip: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut store = match open_store(&cli) {
        Ok(store) => store,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    match run(&mut store, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            warn!(
                "event=cli_command module=cli status=error operation={}",
                err.operation().as_str()
            );
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn open_store(cli: &Cli) -> Result<CliStore, String> {
    let config = if let Some(path) = &cli.config {
        StoreConfig::load(path).map_err(|err| err.to_string())?
    } else if let Some(path) = &cli.db {
        StoreConfig::sqlite(absolute(path)?)
    } else if let Some(dir) = &cli.dir {
        StoreConfig::file(absolute(dir)?)
    } else {
        StoreConfig::sqlite(absolute(Path::new("jotter.db"))?)
    };

    if let Some(log_dir) = &cli.log_dir {
        let log_dir = absolute(log_dir)?;
        init_logging(default_log_level(), &log_dir.to_string_lossy())?;
    } else {
        config.init_logging().map_err(|err| err.to_string())?;
    }

    config.open_store().map_err(|err| err.to_string())
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    std::path::absolute(path).map_err(|err| format!("cannot resolve `{}`: {err}", path.display()))
}

fn run(store: &mut CliStore, command: Commands) -> Result<(), StoreError> {
    match command {
        Commands::List(args) => list(store, &args),
        Commands::Add { title, content } => {
            let id = store.add_note(&NewNote::new(title, content))?;
            println!("{id}");
            Ok(())
        }
        Commands::Show { id } => {
            store.set_selected_note(Some(id))?;
            if let Some(note) = store.current_note() {
                println!("id:      {}", note.id);
                println!("title:   {}", note.title);
                println!("created: {}", note.created_at);
                println!("updated: {}", note.updated_at);
                println!();
                println!("{}", note.content);
            }
            Ok(())
        }
        Commands::Edit { id, title, content } => edit(store, id, title, content),
        Commands::Rm { id } => {
            store.remove_note(id)?;
            println!("removed {id}");
            Ok(())
        }
    }
}

fn list(store: &mut CliStore, args: &ListArgs) -> Result<(), StoreError> {
    let mut options = QueryOptions::default();
    if let Some(field) = args.sort {
        let order = if args.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        options = options.sort_by(NoteField::from(field), order);
    }
    if let Some(skip) = args.skip {
        options = options.skip(skip);
    }
    if let Some(limit) = args.limit {
        options = options.limit(limit);
    }

    store.query_notes(&NoteQuery::all(), &options)?;
    for item in store.note_list() {
        println!("{}  {:>13}  {}", item.id, item.updated_at, item.title);
    }
    Ok(())
}

fn edit(
    store: &mut CliStore,
    id: NoteId,
    title: Option<String>,
    content: Option<String>,
) -> Result<(), StoreError> {
    let mut session = EditorSession::new();
    session.switch_to(store, Some(id)).selected?;

    if let Some(title) = title {
        session.set_title(title);
    }
    if let Some(content) = content {
        session.set_content(content);
    }

    match session.close(store)? {
        SaveOutcome::Saved => println!("saved {id}"),
        SaveOutcome::Unchanged | SaveOutcome::NothingOpen => println!("unchanged {id}"),
    }
    Ok(())
}
