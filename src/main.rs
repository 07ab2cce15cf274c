//! a3s-scrape CLI - search scraping service and one-shot commands.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use a3s_scrape::{
    browser::BrowserFactory,
    config::ServerConfig,
    content::ContentScraper,
    logging::{init_logging, LogConfig},
    search::Searcher,
    server, ImageQuery, ImageSearchResponse, SearchEngine, SearchQuery, SearchResponse,
};

/// a3s-scrape - Browser-driven search scraping API
#[derive(Parser)]
#[command(name = "a3s-scrape")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServerConfig),

    /// Run a single search through a local browser
    Search(SearchArgs),

    /// Scrape the content of a single page
    Content(ContentArgs),

    /// List available search engines
    Engines,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Search engine to drive: google, bing
    #[arg(short, long, default_value = "google")]
    engine: SearchEngine,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Search images instead of web pages
    #[arg(long)]
    images: bool,

    /// Leave out featured snippets and knowledge panels
    #[arg(long)]
    no_featured: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    config: ServerConfig,
}

#[derive(Parser)]
struct ContentArgs {
    /// Page URL
    url: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    config: ServerConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(config) => {
            if let Some(dir) = init_logging(config.log_config().verbose(cli.verbose))? {
                tracing::info!("Writing logs to {}", dir.display());
            }
            server::serve(config).await
        }
        Commands::Search(args) => {
            init_cli_logging(cli.verbose)?;
            run_search(args).await
        }
        Commands::Content(args) => {
            init_cli_logging(cli.verbose)?;
            run_content(args).await
        }
        Commands::Engines => list_engines(),
    }
}

fn init_cli_logging(verbose: bool) -> Result<()> {
    let config = LogConfig {
        default_filter: "warn".to_string(),
        ..Default::default()
    };
    init_logging(config.verbose(verbose))?;
    Ok(())
}

fn list_engines() -> Result<()> {
    println!("Available search engines:\n");
    println!("  Web:");
    println!("    google   - Google Search (featured snippets, ratings, dates)");
    println!("    bing     - Bing");
    println!();
    println!("  Images (--images):");
    println!("    google   - Google Images");
    println!("    bing     - Bing Images");
    println!();
    println!("Usage: a3s-scrape search \"query\" -e bing -l 5");
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let factory = Arc::new(BrowserFactory::new(args.config.launch_config()));
    let searcher = Searcher::new(
        factory,
        args.config.pool_config(),
        args.config.search_settings(),
    );

    let outcome = if args.images {
        let query = ImageQuery::new(&args.query)
            .with_num_results(args.limit)
            .with_engine(args.engine);
        searcher
            .image_search(query)
            .await
            .map(|response| print_images(&response, args.format))
    } else {
        let query = SearchQuery::new(&args.query)
            .with_num_results(args.limit)
            .with_engine(args.engine)
            .with_featured(!args.no_featured);
        searcher
            .search(query)
            .await
            .map(|response| print_results(&response, args.format))
    };

    searcher.shutdown().await;
    outcome??;
    Ok(())
}

fn print_results(response: &SearchResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!(
                "\nSearch results for \"{}\" ({} results in {:.2}s):\n",
                response.query, response.total_results, response.execution_time
            );
            for result in &response.results {
                let label = if result.is_featured() {
                    "*".to_string()
                } else {
                    result.position.to_string()
                };
                println!("{}. {}", label, result.title);
                println!("   URL: {}", result.url);
                println!("   {}", truncate(&result.snippet, 150));
                if !result.features.is_empty() {
                    let features: Vec<String> = result
                        .features
                        .iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect();
                    println!("   {}", features.join(" | "));
                }
                println!();
            }
            if let Some(ref error) = response.error {
                eprintln!("Warning: {}", error);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
        OutputFormat::Compact => {
            for result in &response.results {
                println!("{}\t{}", result.title, result.url);
            }
        }
    }
    Ok(())
}

fn print_images(response: &ImageSearchResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!(
                "\nImage results for \"{}\" ({} images in {:.2}s):\n",
                response.query, response.total_results, response.execution_time
            );
            for image in &response.images {
                println!("{}. {}", image.position, image.title);
                println!("   Image: {}", image.image_url);
                if !image.source_url.is_empty() {
                    println!("   Page:  {}", image.source_url);
                }
                if let (Some(width), Some(height)) = (image.width, image.height) {
                    println!("   Size:  {}x{}", width, height);
                }
                println!();
            }
            if let Some(ref error) = response.error {
                eprintln!("Warning: {}", error);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
        OutputFormat::Compact => {
            for image in &response.images {
                println!("{}\t{}", image.title, image.image_url);
            }
        }
    }
    Ok(())
}

async fn run_content(args: ContentArgs) -> Result<()> {
    let scraper = ContentScraper::from_settings(&args.config.content_settings())?;
    let response = scraper.scrape(&args.url).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text | OutputFormat::Compact => {
            let Some(content) = response.content else {
                anyhow::bail!(response.error.unwrap_or_else(|| "No content".to_string()));
            };
            println!("{}\n", content.title);
            for block in &content.text_blocks {
                println!("{}\n", block);
            }
            println!(
                "{} links, {} images, {} meta tags",
                content.links.len(),
                content.images.len(),
                content.meta_tags.len()
            );
        }
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
