use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scholar_search::config::{find_config_file, load_config, load_from_env, Config};
use scholar_search::utils::render_result;
use scholar_search::{
    DetailStrategy, OrchestratorResult, SearchMode, SearchOrchestrator, SearchQuery, SourceError,
    SourceKind,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scholar Search - Find studies on Google Scholar and PubMed
#[derive(Parser, Debug)]
#[command(name = "scholar-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find studies on Google Scholar and PubMed", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress everything but errors in the log
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides configuration)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable card or link list
    Text,
    /// JSON (machine-readable, includes failure reasons)
    Json,
}

/// Available sources
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    #[value(name = "scholar", alias = "gs")]
    Scholar,
    #[value(name = "pubmed", alias = "pmc")]
    Pubmed,
}

impl From<Source> for SourceKind {
    fn from(source: Source) -> Self {
        match source {
            Source::Scholar => SourceKind::Html,
            Source::Pubmed => SourceKind::Citation,
        }
    }
}

/// How top-ten PubMed results are fetched
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    /// Full records with title, authors and abstract
    Full,
    /// Provider links only
    Links,
}

impl From<Strategy> for DetailStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Full => DetailStrategy::FullRecord,
            Strategy::Links => DetailStrategy::CrossReference,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the most relevant study
    First {
        /// Search terms
        query: String,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = Source::Scholar)]
        source: Source,

        /// Minimum publication year (YYYY)
        #[arg(long, short = 'y')]
        min_year: Option<String>,
    },

    /// List up to ten studies as links
    #[command(alias = "top10")]
    Top {
        /// Search terms
        query: String,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = Source::Scholar)]
        source: Source,

        /// Minimum publication year (YYYY)
        #[arg(long, short = 'y')]
        min_year: Option<String>,

        /// How PubMed identifiers are turned into results
        #[arg(long, value_enum, default_value_t = Strategy::Full)]
        strategy: Strategy,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("scholar_search={}", env_filter)),
    );

    // Logs go to stderr so stdout only carries results
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?
    } else {
        load_from_env().context("Failed to load configuration from environment")?
    };

    if let Some(timeout) = cli.timeout {
        config.http.timeout_secs = timeout;
    }
    Ok(config)
}

fn build_query(
    config: &Config,
    terms: &str,
    mode: SearchMode,
    min_year: Option<&str>,
) -> Result<SearchQuery, SourceError> {
    let year = min_year.unwrap_or(config.search.default_min_year.as_str());
    SearchQuery::new(terms, mode)?.with_min_year(year)
}

/// Print the outcome; returns whether the search succeeded
fn print_result(result: &OrchestratorResult, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.to_report())?);
        }
        OutputFormat::Text => match render_result(result, std::io::stdout().is_terminal()) {
            Ok(text) => println!("{}", text),
            Err(notice) => eprintln!("{}", notice),
        },
    }
    Ok(result.is_success())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = resolve_config(&cli)?;

    let (source, mode, terms, min_year) = match &cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::First {
            query,
            source,
            min_year,
        } => (*source, SearchMode::First, query, min_year),
        Commands::Top {
            query,
            source,
            min_year,
            ..
        } => (*source, SearchMode::TopTen, query, min_year),
    };

    let result = match build_query(&config, terms, mode, min_year.as_deref()) {
        Ok(query) => {
            let mut orchestrator = SearchOrchestrator::from_config(&config)
                .context("Failed to build HTTP client")?;
            if let Commands::Top { strategy, .. } = &cli.command {
                orchestrator = orchestrator.with_top_ten_strategy((*strategy).into());
            }
            orchestrator.run(source.into(), &query).await
        }
        Err(err) => {
            tracing::warn!("Rejected query: {}", err);
            OrchestratorResult::Failed(err)
        }
    };

    if !print_result(&result, cli.output)? {
        std::process::exit(1);
    }

    Ok(())
}
