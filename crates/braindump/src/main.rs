//! Braindump CLI - agent-friendly local memory.

use anyhow::{bail, Context, Result};
use braindump_core::{match_preview, BraindumpService, Error, Note, NoteUpdate};
use braindump_files::FileStore;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const STORE_DIR: &str = ".braindump";

#[derive(Parser)]
#[command(
    name = "braindump",
    about = "Agent-friendly local memory",
    long_about = "Store and search notes across conversations. Fast, local, and persistent.",
    version
)]
struct Cli {
    /// Path to the notes directory
    #[arg(long, global = true, env = "BRAINDUMP_STORE")]
    store: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Log every storage step to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new note
    Add {
        /// Category to file the note under
        category: String,
        /// Note title (or use --title)
        title: Option<String>,
        /// Note content (or use --content, or pipe via stdin)
        content: Option<String>,
        #[arg(long = "title", id = "title_flag")]
        title_flag: Option<String>,
        #[arg(long = "content", id = "content_flag")]
        content_flag: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Get notes from a category, optionally filtered by title
    Get {
        category: String,
        /// Case-insensitive title filter
        pattern: Option<String>,
    },
    /// Show one note by ID, ID prefix, or title
    Show { id: String },
    /// List notes
    List {
        /// Only this category
        category: Option<String>,
    },
    /// Search notes
    Search {
        query: String,
        /// Search only in this category
        #[arg(long = "in")]
        category: Option<String>,
        /// Filter by comma-separated tags
        #[arg(long = "tag")]
        tags: Option<String>,
    },
    /// Update a note
    Update {
        /// Note ID, ID prefix, or title
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// New comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Move the note to another category
        #[arg(long)]
        category: Option<String>,
    },
    /// Append content to a note
    Append {
        /// Note ID, ID prefix, or title
        id: String,
        content: String,
    },
    /// Delete a note
    Delete {
        /// Note ID, ID prefix, or title
        id: String,
    },
    /// List all categories
    Categories,
    /// List all tags
    Tags,
    /// Rebuild the search index from the note files
    Reindex,
}

fn default_store_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(STORE_DIR))
        .unwrap_or_else(|| PathBuf::from(STORE_DIR))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("BRAINDUMP_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_note(note: &Note) {
    println!("{} ({})", note.title, note.short_id());
    println!("{}", "-".repeat(note.title.chars().count() + 11));
    println!("{}", note.content);
    println!();
    println!("Created: {}", note.created.format("%Y-%m-%d %H:%M:%S"));
    println!("Category: {}", note.category);
    if !note.tags.is_empty() {
        println!("Tags: {}", note.tags.join(", "));
    }
}

fn preview(content: &str, max: usize) -> String {
    let flat = content.replace(['\n', '\r'], " ");
    if flat.chars().count() > max {
        format!("{}...", flat.chars().take(max).collect::<String>())
    } else {
        flat
    }
}

/// Resolver failures get the candidate list printed before the error.
fn explain(err: Error) -> anyhow::Error {
    let hint = match &err {
        Error::AmbiguousId { .. } => "please specify a longer ID prefix",
        Error::AmbiguousTitle { .. } => "please specify the note by ID",
        _ => return err.into(),
    };
    eprintln!("{}:", err);
    for c in err.candidates().unwrap_or_default() {
        eprintln!("  [{}] {} (id: {})", c.category, c.title, c.short_id());
    }
    anyhow::anyhow!(hint)
}

fn run(service: &BraindumpService<FileStore>, command: Commands, format: Format) -> Result<()> {
    let json = format == Format::Json;

    match command {
        Commands::Add {
            category,
            title,
            content,
            title_flag,
            content_flag,
            tags,
        } => {
            let Some(title) = title_flag.or(title) else {
                bail!("title is required (use --title flag or provide as argument)");
            };
            let content = match content_flag.or(content) {
                Some(c) => c,
                None if !is_stdin_tty() => read_stdin()?,
                None => String::new(),
            };
            if content.trim().is_empty() {
                bail!("content is required (use --content flag, provide as argument, or pipe via stdin)");
            }
            let tags = tags.map(|t| parse_tags(&t)).unwrap_or_default();

            let note = service.add_note(&category, &title, &content, tags)?;
            if json {
                return print_json(&note);
            }
            println!(
                "✓ Added note to {}: \"{}\" (id: {})",
                note.category,
                note.title,
                note.short_id()
            );
        }

        Commands::Get { category, pattern } => {
            let notes = service.notes_in(&category, pattern.as_deref().unwrap_or(""))?;
            if json {
                return print_json(&notes);
            }
            if notes.is_empty() {
                println!("No notes found");
            }
            for (i, note) in notes.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_note(note);
            }
        }

        Commands::Show { id } => {
            let note = service.find_note(&id).map_err(explain)?;
            if json {
                return print_json(&note);
            }
            print_note(&note);
        }

        Commands::List { category } => {
            let mut notes = service.list_notes(category.as_deref())?;
            if json {
                return print_json(&notes);
            }
            if notes.is_empty() {
                println!("No notes found");
                return Ok(());
            }

            notes.sort_by(|a, b| {
                a.category
                    .cmp(&b.category)
                    .then_with(|| a.created.cmp(&b.created))
            });

            let mut current: Option<&str> = None;
            for note in &notes {
                if current != Some(note.category.as_str()) {
                    if current.is_some() {
                        println!();
                    }
                    current = Some(&note.category);
                    println!("[{}]", note.category);
                }
                println!("  {} - {}", note.title, preview(&note.content, 60));
                println!(
                    "    ID: {} | Created: {}",
                    note.short_id(),
                    note.created.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\nTotal: {} note(s)", notes.len());
        }

        Commands::Search {
            query,
            category,
            tags,
        } => {
            let tags = tags.map(|t| parse_tags(&t)).unwrap_or_default();
            let notes = service.search(&query, category.as_deref(), &tags)?;
            if json {
                return print_json(&notes);
            }
            if notes.is_empty() {
                println!("No notes found");
                return Ok(());
            }

            println!("Found {} note(s):\n", notes.len());
            for note in &notes {
                println!("  [{}] {} ({})", note.category, note.title, note.short_id());
                let excerpt = match_preview(&note.content, &query);
                if !excerpt.is_empty() {
                    println!("  > {}", excerpt);
                }
                println!();
            }
        }

        Commands::Update {
            id,
            title,
            content,
            tags,
            category,
        } => {
            let update = NoteUpdate {
                title,
                content,
                tags: tags.map(|t| parse_tags(&t)),
                category,
            };
            let note = service.update_note(&id, update).map_err(explain)?;
            if json {
                return print_json(&note);
            }
            println!("✓ Updated note: \"{}\" (id: {})", note.title, note.short_id());
        }

        Commands::Append { id, content } => {
            let note = service.append_note(&id, &content).map_err(explain)?;
            if json {
                return print_json(&note);
            }
            println!("✓ Appended to note: \"{}\" (id: {})", note.title, note.short_id());
        }

        Commands::Delete { id } => {
            let note = service.delete_note(&id).map_err(explain)?;
            if json {
                return print_json(&note);
            }
            println!("✓ Deleted note: \"{}\" (id: {})", note.title, note.short_id());
        }

        Commands::Categories => {
            let categories = service.categories()?;
            if json {
                return print_json(&categories);
            }
            if categories.is_empty() {
                println!("No categories found");
                return Ok(());
            }
            println!("Categories:");
            for c in categories {
                println!("  {} ({} note(s))", c.name, c.count);
            }
        }

        Commands::Tags => {
            let tags = service.tags()?;
            if json {
                return print_json(&tags);
            }
            if tags.is_empty() {
                println!("No tags found");
                return Ok(());
            }
            println!("Tags:");
            for tag in tags {
                println!("  {}", tag);
            }
        }

        Commands::Reindex => {
            let report = service.reindex()?;
            if json {
                return print_json(&report);
            }
            println!(
                "✓ Reindexed {} note(s), skipped {}",
                report.indexed, report.skipped
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli.store.unwrap_or_else(default_store_path);
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to initialize store at {}", path.display()))?;
    tracing::debug!(store = %path.display(), "opened store");
    let service = BraindumpService::new(store);

    let result = run(&service, cli.command, cli.format);
    let closed = service.close().context("Failed to close store");
    result?;
    closed
}
