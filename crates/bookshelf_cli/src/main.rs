//! Command-line front end for the bookshelf store.
//!
//! # Responsibility
//! - Map subcommands onto the process-wide core API.
//! - Act as the presentation layer: print notices for failed operations.

use bookshelf_core::codec::input_from_json;
use bookshelf_core::{
    clear_all_books, configure, delete_book, get_book_by_id, get_books, init_logging, save_book,
    BookId, BookInput, Notice, NotificationSink, Page, StoreConfig, StoreError, StoreLocation,
};
use clap::{Parser, Subcommand};
use log::warn;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about = "Local picture-book store")]
struct Cli {
    /// Database file (defaults to $BOOKSHELF_DB_PATH or the temp directory).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute directory for rotating log files; stderr when absent.
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the core library is linked.
    Ping,
    /// List stored books.
    List,
    /// Print one book's metadata as JSON.
    Show { id: BookId },
    /// Add a book from media files.
    Add {
        #[arg(long)]
        title: String,
        /// `image=PATH,audio=PATH`, either part optional; `blank` for an empty page.
        #[arg(long = "page", required = true, value_parser = parse_page_spec)]
        pages: Vec<PageSpec>,
    },
    /// Save one book object, or an array of them, from a JSON file.
    Import { file: PathBuf },
    /// Delete a book by id.
    Delete { id: BookId },
    /// Delete every book.
    Clear,
    /// Save, read back and delete a probe book.
    SelfCheck,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PageSpec {
    image: Option<PathBuf>,
    audio: Option<PathBuf>,
}

fn parse_page_spec(raw: &str) -> Result<PageSpec, String> {
    let mut spec = PageSpec::default();
    if raw.trim() == "blank" {
        return Ok(spec);
    }

    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("expected key=path, got `{part}`"))?;
        let slot = match key.trim() {
            "image" => &mut spec.image,
            "audio" => &mut spec.audio,
            other => return Err(format!("unknown page field `{other}`; expected image|audio")),
        };
        if slot.is_some() {
            return Err(format!("page field `{}` given twice", key.trim()));
        }
        *slot = Some(PathBuf::from(value.trim()));
    }

    if spec == PageSpec::default() {
        return Err("page spec is empty; use `blank` for an empty page".to_string());
    }
    Ok(spec)
}

#[derive(Debug)]
enum CliError {
    /// Already shown to the user through the notification sink.
    Store(StoreError),
    Input(String),
    NotFound(BookId),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Input(message) => f.write_str(message),
            Self::NotFound(id) => write!(f, "book {id} not found"),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

struct StderrNotifier;

impl NotificationSink for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("bookshelf: {} [{}]", notice.message, notice.code);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(bookshelf_core::config::log_level_from_env);
    if let Err(err) = init_logging(&level, cli.log_dir.as_deref()) {
        eprintln!("bookshelf: logging disabled: {err}");
    }

    let mut config = StoreConfig::from_env();
    if let Some(path) = &cli.db {
        config.location = StoreLocation::File(path.clone());
    }
    if let Err(err) = configure(config, Some(Arc::new(StderrNotifier))) {
        eprintln!("bookshelf: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Store(err)) => {
            warn!("event=cli_command module=cli status=error error_code={}", err.code());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("bookshelf: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Ping => {
            println!("bookshelf_core ping={}", bookshelf_core::ping());
            println!("bookshelf_core version={}", bookshelf_core::core_version());
        }
        Command::List => {
            for book in get_books().await? {
                println!(
                    "{}\t{}\t{} page(s)\t{}",
                    book.id,
                    book.title,
                    book.pages.len(),
                    book.updated_at.to_rfc3339()
                );
            }
        }
        Command::Show { id } => {
            let book = get_book_by_id(id).await?.ok_or(CliError::NotFound(id))?;
            let json = serde_json::to_string_pretty(&book.summary())
                .map_err(|err| CliError::Input(format!("failed to render book: {err}")))?;
            println!("{json}");
        }
        Command::Add { title, pages } => {
            let pages = pages.iter().map(load_page).collect::<Result<Vec<_>, _>>()?;
            let id = save_book(&BookInput::new(title, pages)).await?;
            println!("{id}");
        }
        Command::Import { file } => {
            for input in read_import_file(&file)? {
                let id = save_book(&input).await?;
                println!("{id}");
            }
        }
        Command::Delete { id } => {
            delete_book(id).await?;
        }
        Command::Clear => {
            clear_all_books().await?;
        }
        Command::SelfCheck => {
            if !bookshelf_core::api::default_service().self_check().await {
                return Err(CliError::Input("storage self-check failed".to_string()));
            }
            println!("ok");
        }
    }
    Ok(())
}

fn load_page(spec: &PageSpec) -> Result<Page, CliError> {
    let read = |path: &Option<PathBuf>| -> Result<Option<Vec<u8>>, CliError> {
        path.as_ref()
            .map(|path| {
                std::fs::read(path).map_err(|err| {
                    CliError::Input(format!("failed to read `{}`: {err}", path.display()))
                })
            })
            .transpose()
    };
    Ok(Page::new(read(&spec.image)?, read(&spec.audio)?))
}

fn read_import_file(file: &Path) -> Result<Vec<BookInput>, CliError> {
    let text = std::fs::read_to_string(file)
        .map_err(|err| CliError::Input(format!("failed to read `{}`: {err}", file.display())))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|err| CliError::Input(format!("invalid JSON in `{}`: {err}", file.display())))?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .iter()
        .map(|item| input_from_json(item).map_err(|err| CliError::Input(err.to_string())))
        .collect()
}
