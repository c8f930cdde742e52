//! Recommendation binary entry point.
//!
//! Command-line front end over the same artifacts the server uses. Supports a
//! single lookup, an interactive REPL, and listing the known titles, with
//! table or JSON output.
//!
//! # Examples
//!
//! Single lookup:
//! ```bash
//! recommend --artifacts artifacts --title "The Da Vinci Code"
//! ```
//!
//! JSON output with ten neighbors:
//! ```bash
//! recommend --title "Harry Potter and the Sorcerer's Stone" --format json --neighbors 10
//! ```
//!
//! Interactive mode:
//! ```bash
//! recommend --interactive
//! ```

use anyhow::{Context, Result};
use book_recommender::{
    config::RecommenderConfig,
    models::RecommendedBook,
    recommend::{KnnRecommender, RecommendError, Recommender, NOT_FOUND_MESSAGE},
    server::{BookCard, RecommendResponse},
    BruteForceIndex,
};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for recommendations
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// Machine-readable JSON
    Json,
}

/// Book recommendation CLI
#[derive(Parser, Debug)]
#[command(
    name = "recommend",
    version,
    about = "Recommend books similar to a given title",
    long_about = "Look up the nearest neighbors of a book in the rating pivot matrix and \
                  print them with author, year and a retailer search link.

EXAMPLES:
  Single lookup:
    recommend --title \"The Da Vinci Code\"

  JSON output:
    recommend --title \"The Hobbit\" --format json

  Titles containing a word:
    recommend --list-titles | grep Potter

  Interactive mode:
    recommend --interactive"
)]
struct Args {
    /// Directory holding the artifact files [env: BOOKREC_ARTIFACTS_DIR]
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Title to recommend from (exact match)
    #[arg(long, value_name = "TITLE", conflicts_with_all = ["interactive", "list_titles"])]
    title: Option<String>,

    /// Print every known title and exit
    #[arg(long, conflicts_with = "interactive")]
    list_titles: bool,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Neighbors per query, the query book included [env: BOOKREC_NEIGHBORS]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    neighbors: Option<u64>,

    /// Retailer base URL for search links [env: BOOKREC_RETAILER_URL]
    #[arg(long, value_name = "URL")]
    retailer_url: Option<String>,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Truncate to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format recommendations as a table
fn format_books_table(books: &[RecommendedBook]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Author").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Distance").add_attribute(Attribute::Bold),
        Cell::new("Search URL").add_attribute(Attribute::Bold),
    ]);

    for (idx, book) in books.iter().enumerate() {
        // The query book itself leads the list
        let title_cell = if idx == 0 {
            Cell::new(truncate(&book.title, 50)).fg(Color::Green)
        } else {
            Cell::new(truncate(&book.title, 50))
        };

        let author_cell = if book.details.is_some() {
            Cell::new(truncate(book.author_or_unknown(), 30))
        } else {
            Cell::new(book.author_or_unknown()).fg(Color::Yellow)
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            title_cell,
            author_cell,
            Cell::new(book.year_or_unknown()),
            Cell::new(format!("{:.4}", book.distance)),
            Cell::new(&book.search_url),
        ]);
    }

    table.to_string()
}

/// Format recommendations as JSON, in the same shape as the HTTP API
fn format_books_json(query: &str, books: &[RecommendedBook]) -> Result<String> {
    let results: Vec<BookCard> = books.iter().cloned().map(BookCard::from).collect();
    let response = RecommendResponse {
        query: query.to_string(),
        count: results.len(),
        results,
    };
    serde_json::to_string_pretty(&response).with_context(|| "Failed to serialize results to JSON")
}

fn print_books(query: &str, books: &[RecommendedBook], format: OutputFormat, elapsed_secs: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_books_table(books));
            println!("\n{} recommendations in {:.3}s", books.len(), elapsed_secs);
        }
        OutputFormat::Json => println!("{}", format_books_json(query, books)?),
    }
    Ok(())
}

/// Print titles, optionally filtered by a case-insensitive substring
fn print_titles(titles: &[String], filter: Option<&str>, format: OutputFormat) -> Result<()> {
    let needle = filter.map(str::to_lowercase);
    let matching: Vec<&String> = titles
        .iter()
        .filter(|t| match &needle {
            Some(n) => t.to_lowercase().contains(n),
            None => true,
        })
        .collect();

    match format {
        OutputFormat::Table => {
            for title in &matching {
                println!("{}", title);
            }
            if filter.is_some() {
                println!("\n{} of {} titles match", matching.len(), titles.len());
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&matching)
                .with_context(|| "Failed to serialize titles to JSON")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Display detailed view of a single recommendation
fn display_book_detail(book: &RecommendedBook, rank: usize) {
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Title: {}", book.title);
    println!("Author: {}", book.author_or_unknown());
    println!("Year: {}", book.year_or_unknown());
    println!("Cover: {}", book.cover_url().unwrap_or("-"));
    println!("Distance: {:.4}", book.distance);
    println!("Search: {}", book.search_url);
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("Commands:");
    println!("  <title>          - Recommend books similar to an exact title");
    println!("  /list [TEXT]     - List titles, optionally those containing TEXT");
    println!("  /format table    - Use table output format");
    println!("  /format json     - Use JSON output format");
    println!("  /detail N        - Show full details for result rank N");
    println!("  /help            - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
fn run_interactive(recommender: &KnnRecommender<BruteForceIndex>, mut format: OutputFormat) -> Result<()> {
    println!("Interactive Book Recommender ({} titles)", recommender.titles().len());
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;
    let mut last_results: Vec<RecommendedBook> = Vec::new();

    loop {
        match rl.readline("Book> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.splitn(2, char::is_whitespace).collect();
                    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());
                    match parts[0] {
                        "/help" => print_help(),
                        "/list" => {
                            if let Err(e) = print_titles(recommender.titles(), arg, format) {
                                eprintln!("Error listing titles: {}", e);
                            }
                        }
                        "/format" => match arg {
                            Some("table") => {
                                format = OutputFormat::Table;
                                println!("Set output format to table");
                            }
                            Some("json") => {
                                format = OutputFormat::Json;
                                println!("Set output format to JSON");
                            }
                            _ => eprintln!("Usage: /format [table|json]"),
                        },
                        "/detail" => match arg.map(str::parse::<usize>) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_results.len() => {
                                display_book_detail(&last_results[rank - 1], rank);
                            }
                            Some(Ok(rank)) if rank > last_results.len() => {
                                eprintln!(
                                    "Rank {} out of range (last lookup had {} results)",
                                    rank,
                                    last_results.len()
                                );
                            }
                            _ => eprintln!("Usage: /detail N"),
                        },
                        other => eprintln!("Unknown command: {}. Type /help for available commands.", other),
                    }
                    continue;
                }

                let start = Instant::now();
                match recommender.recommend_books(line) {
                    Ok(books) => {
                        let elapsed = start.elapsed().as_secs_f64();
                        if let Err(e) = print_books(line, &books, format, elapsed) {
                            eprintln!("Error formatting results: {}", e);
                        }
                        last_results = books;
                    }
                    Err(RecommendError::TitleNotFound(_)) => {
                        println!("{}", NOT_FOUND_MESSAGE);
                        println!("Use /list TEXT to find the exact title.");
                    }
                    Err(e) => eprintln!("Recommendation failed: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Run single-lookup mode
fn run_single(recommender: &KnnRecommender<BruteForceIndex>, title: &str, format: OutputFormat) -> Result<()> {
    let start = Instant::now();
    let books = match recommender.recommend_books(title) {
        Ok(books) => books,
        Err(RecommendError::TitleNotFound(_)) => {
            anyhow::bail!("{} ({:?})", NOT_FOUND_MESSAGE, title)
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to recommend from '{}'", title));
        }
    };
    debug!("Lookup took {:?}", start.elapsed());

    print_books(title, &books, format, start.elapsed().as_secs_f64())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    if !args.interactive && !args.list_titles && args.title.is_none() {
        anyhow::bail!(
            "One of --title, --list-titles or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    let mut config = RecommenderConfig::from_env();
    if let Some(dir) = args.artifacts {
        config.artifacts_dir = dir;
    }
    if let Some(n) = args.neighbors {
        config.n_neighbors = Some(n as usize);
    }
    if let Some(url) = args.retailer_url {
        config.retailer_url = url;
    }

    info!("Loading artifacts from: {}", config.artifacts_dir.display());

    let recommender = config.load_recommender().await.with_context(|| {
        format!(
            "Failed to load artifacts from {}",
            config.artifacts_dir.display()
        )
    })?;

    if args.list_titles {
        return print_titles(recommender.titles(), None, args.format);
    }

    if args.interactive {
        run_interactive(&recommender, args.format)
    } else if let Some(title) = args.title.as_deref() {
        run_single(&recommender, title, args.format)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_recommender::models::BookDetails;

    fn book(title: &str, details: bool) -> RecommendedBook {
        RecommendedBook {
            title: title.to_string(),
            details: details.then(|| BookDetails {
                author: "Dan Brown".to_string(),
                year: "2003".to_string(),
                cover_url: "http://covers/x.jpg".to_string(),
            }),
            distance: 0.5,
            search_url: format!("https://www.amazon.com/s?k={}", title.replace(' ', "+")),
        }
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ééééééééé", 5), "éé...");
    }

    #[test]
    fn test_table_contains_columns_and_placeholder() {
        let table = format_books_table(&[book("The Da Vinci Code", true), book("Orphan", false)]);
        assert!(table.contains("Dan Brown"));
        assert!(table.contains("Unknown"));
    }

    #[test]
    fn test_json_matches_api_shape() {
        let json = format_books_json("The Da Vinci Code", &[book("The Da Vinci Code", true)]).unwrap();
        let parsed: RecommendResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.query, "The Da Vinci Code");
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.results[0].author, "Dan Brown");
    }
}
