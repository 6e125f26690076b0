//! stockrag CLI - Ask questions about recent stock news.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use stockrag_core::StockRagConfig;
use stockrag_embed::OnnxEmbedder;
use stockrag_server::{AskParams, StockRagServer, ToolResult};

/// stockrag - Retrieval-augmented answers over recent stock news
#[derive(Parser)]
#[command(name = "stockrag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/stockrag/config.toml, then ./stockrag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and write a default config file
    Init,

    /// Ask a question about recent news
    Ask {
        /// The question
        question: String,

        /// Restrict to one symbol
        #[arg(short, long)]
        symbol: Option<String>,

        /// Lookback window in hours
        #[arg(long)]
        hours: Option<u32>,

        /// Results per expanded query
        #[arg(short = 'n', long)]
        results: Option<usize>,

        /// Print the structured response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest a JSON or JSON-lines news file
    Ingest {
        /// Path to the news file
        path: PathBuf,
    },

    /// Generate headline summaries for entries with unusable summaries
    Backfill {
        /// Maximum documents to process (default from config)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Delete every document of a symbol
    Remove {
        /// Symbol to remove
        symbol: String,
    },

    /// Show statistics
    Stats {
        /// Symbol to get stats for (all if not specified)
        #[arg(short, long)]
        symbol: Option<String>,
    },
}

fn setup_logging(verbose: bool) {
    let default = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(
    path: Option<&Path>,
    database: Option<PathBuf>,
) -> Result<StockRagConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(p) => StockRagConfig::load(p)?,
        None => StockRagConfig::load_default()?,
    };
    if let Some(db) = database {
        config.database.path = db;
    }
    Ok(config)
}

fn report(result: ToolResult) {
    if result.success {
        println!("{}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // API keys may live in a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Init => {
            init(config)?;
        }
        Commands::Ask {
            question,
            symbol,
            hours,
            results,
            json,
        } => {
            let server = get_server(config)?;
            let params = AskParams {
                question,
                symbol,
                hours,
                results,
            };
            if json {
                match server.ask_json(params).await {
                    Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                report(server.ask(params).await);
            }
        }
        Commands::Ingest { path } => {
            let server = get_server(config)?;
            report(server.ingest(&path).await);
        }
        Commands::Backfill { limit } => {
            let server = get_server(config)?;
            report(server.backfill_summaries(limit).await);
        }
        Commands::Remove { symbol } => {
            let server = get_server(config)?;
            report(server.remove_symbol(&symbol).await);
        }
        Commands::Stats { symbol } => {
            let server = get_server(config)?;
            report(server.stats(symbol.as_deref()).await);
        }
    }

    Ok(())
}

fn init(config: StockRagConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("stockrag").join("config.toml");
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, toml::to_string_pretty(&config)?)?;
            println!("Wrote default config to: {}", config_path.display());
        }
    }

    let server = StockRagServer::new(config)?;
    let config = server.config();
    println!("Initialized database at: {}", config.database.path.display());

    if OnnxEmbedder::is_available(&config.embedding.model_path) {
        println!("Embedding model: {}", config.embedding.model_path.display());
    } else {
        println!(
            "Embedding model not found at {}; using the hashing embedder.",
            config.embedding.model_path.display()
        );
    }

    if config.llm.api_key().is_none() {
        println!(
            "{} is not set; answers will list summaries without synthesis.",
            config.llm.api_key_env
        );
    }

    Ok(())
}

fn get_server(config: StockRagConfig) -> Result<StockRagServer, Box<dyn std::error::Error>> {
    if !config.database.path.exists() {
        eprintln!(
            "Database {} does not exist. Run 'stockrag init' first, or specify a path with -d.",
            config.database.path.display()
        );
        std::process::exit(1);
    }

    Ok(StockRagServer::new(config)?)
}
