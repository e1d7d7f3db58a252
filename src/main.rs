//! CLI entry point for the corpus index.
//!
//! Commands: `init`, `schema`, `build`, `query` and `config`. Logs go to
//! stderr; query results go to stdout as a table or JSON.

use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use corpus_index::display::{
    create_build_summary_table, create_matches_table, create_spinner,
};
use corpus_index::store::connect;
use corpus_index::{
    CorpusError, CorpusResult, EmbeddingGenerator, ExitCode, FastEmbedGenerator, IndexBuilder,
    Resolver, Retriever, Settings, SqliteRecordStore, TableKind,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "corpus-index",
    version,
    about = "Vector index over customer reviews and medical records",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Write .corpus-index/settings.toml with defaults
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Create customer_reviews and medical_records if missing
    Schema,

    /// Embed both corpora and persist the index
    Build {
        /// Rows per store page (overrides indexing.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Artifact path (overrides index_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Find the records closest to a piece of text
    Query {
        /// Query text
        text: String,

        /// Number of neighbours to retrieve (overrides query.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Keep only matches from one corpus
        #[arg(long, value_enum)]
        corpus: Option<CorpusArg>,

        /// Artifact to query (overrides index_path)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum CorpusArg {
    Reviews,
    Medical,
}

impl From<CorpusArg> for TableKind {
    fn from(arg: CorpusArg) -> Self {
        match arg {
            CorpusArg::Reviews => TableKind::CustomerReview,
            CorpusArg::Medical => TableKind::MedicalRecord,
        }
    }
}

fn config_error(e: impl std::fmt::Display) -> CorpusError {
    CorpusError::Configuration {
        reason: e.to_string(),
    }
}

fn load_settings(path: Option<&PathBuf>) -> CorpusResult<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(config_error)?;
    settings.validate()?;
    Ok(settings)
}

fn load_embedder(settings: &Settings) -> CorpusResult<Arc<dyn EmbeddingGenerator>> {
    let spinner = create_spinner(&format!("Loading {}", settings.embedding.model));
    let generator = FastEmbedGenerator::new(
        &settings.embedding.model,
        settings.embedding.model_cache_dir(),
        settings.embedding.show_download_progress,
    );
    spinner.finish_and_clear();
    Ok(Arc::new(generator?))
}

async fn open_store(settings: &Settings) -> CorpusResult<Arc<SqliteRecordStore>> {
    let pool = connect(&settings.database).await?;
    Ok(Arc::new(SqliteRecordStore::new(pool)))
}

async fn run(cli: Cli) -> CorpusResult<ExitCode> {
    if let Commands::Init { force } = cli.command {
        let path = Settings::init_config_file(force).map_err(config_error)?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(ExitCode::Success);
    }

    let mut settings = load_settings(cli.config.as_ref())?;
    corpus_index::logging::init(&settings.logging)?;

    match cli.command {
        Commands::Init { .. } => Ok(ExitCode::Success),

        Commands::Config => {
            let toml = toml::to_string_pretty(&settings).map_err(config_error)?;
            print!("{toml}");
            Ok(ExitCode::Success)
        }

        Commands::Schema => {
            let store = open_store(&settings).await?;
            store.create_schema().await?;
            println!("Tables customer_reviews and medical_records are ready.");
            Ok(ExitCode::Success)
        }

        Commands::Build {
            batch_size,
            output,
            no_progress,
        } => {
            if let Some(batch_size) = batch_size {
                settings.indexing.batch_size = batch_size;
            }
            let index_path = output.unwrap_or_else(|| settings.index_path.clone());

            let store = open_store(&settings).await?;
            let embedder = load_embedder(&settings)?;
            let show_progress = !no_progress && std::io::stderr().is_terminal();

            let stats = IndexBuilder::new(store, embedder, &settings)?
                .with_progress(show_progress)
                .build(&index_path)
                .await?;

            println!("{}", create_build_summary_table(&stats));
            Ok(ExitCode::Success)
        }

        Commands::Query {
            text,
            top_k,
            corpus,
            index,
            json,
        } => {
            let top_k = top_k.unwrap_or(settings.query.default_top_k);
            let filter = corpus.map(TableKind::from);
            let index_path = index.unwrap_or_else(|| settings.index_path.clone());

            let store = open_store(&settings).await?;
            let resolver = Arc::new(Resolver::new(store, settings.partition()?));
            resolver.load_index(&index_path)?;
            let embedder = load_embedder(&settings)?;

            let matches = Retriever::new(resolver, embedder)
                .query_text(&text, top_k, filter)
                .await?;

            if json {
                let output = serde_json::json!({
                    "query": text,
                    "top_k": top_k,
                    "corpus": filter.map(|kind| kind.table_name()),
                    "matches": matches,
                });
                let rendered = serde_json::to_string_pretty(&output).map_err(config_error)?;
                println!("{rendered}");
            } else if matches.is_empty() {
                println!("No matches found.");
            } else {
                println!("{}", create_matches_table(&matches));
            }

            Ok(ExitCode::from_matches(&matches))
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code.into(),
        Err(error) => {
            eprintln!("Error [{}]: {error}", error.status_code());
            for suggestion in error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            ExitCode::from_error(&error).into()
        }
    }
}
