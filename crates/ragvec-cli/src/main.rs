//! CLI entry point for the ragvec engine (for dev and testing).

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ragvec_core::{
    app_data_dir, index_file, load_config, set_index_dir, status, Config, Generator, Metadata,
    NormalizedStore, OllamaClient, Retriever, SimilarityIndex, StoreError, NO_RESULTS,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragvec")]
#[command(about = "ragvec: vector retrieval for local RAG")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where ragvec stores its config and index (app data directory).
    DataDir,
    /// Print the effective config.
    Config,
    /// Set and remember the index directory.
    SetIndexDir {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Embed chunks from a JSON Lines file and save them into the index.
    Index {
        /// One `{"text", "source", "page"?, "index"?}` object per line.
        #[arg(value_name = "CHUNKS")]
        chunks: PathBuf,
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Add to the existing index instead of replacing it.
        #[arg(long)]
        append: bool,
    },
    /// Show the passages most similar to a query.
    Search {
        query: String,
        #[arg(short)]
        k: Option<usize>,
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Answer a question from the indexed passages.
    Ask {
        question: String,
        #[arg(short)]
        k: Option<usize>,
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Print the retrieved context instead of calling the model.
        #[arg(long)]
        no_llm: bool,
    },
    /// Show record count and dimension of the index.
    Info {
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct JsonHit<'a> {
    rank: usize,
    score: f32,
    text: &'a str,
    metadata: &'a Metadata,
}

type CliResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Commands::Status)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> CliResult {
    let config = load_config();
    match command {
        Commands::Status => {
            println!("ragvec backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Config => {
            println!("ollama_url     = {}", config.ollama_url());
            println!("embed_model    = {}", config.embed_model());
            println!("generate_model = {}", config.generate_model());
            println!("top_k          = {}", config.top_k());
            match config.index_dir() {
                Some(p) => println!("index_dir      = {}", p.display()),
                None => println!("index_dir      = (unknown)"),
            }
        }
        Commands::SetIndexDir { path } => {
            let path = set_index_dir(&path)?;
            println!("Index directory set to {}", path.display());
        }
        Commands::Index {
            chunks,
            index_dir,
            append,
        } => {
            let dir = resolve_index_dir(&config, index_dir)?;
            let mut store = if append {
                match NormalizedStore::open(&dir) {
                    Ok(store) => store,
                    Err(StoreError::NotFound(_)) => NormalizedStore::new(),
                    Err(e) => return Err(e.into()),
                }
            } else {
                NormalizedStore::new()
            };
            let client = client(&config)?;
            let ids = index_file(&mut store, &client, &chunks).await?;
            store.save(&dir)?;
            println!("Indexed {} chunk(s); {} in {}", ids.len(), store.count(), dir.display());
        }
        Commands::Search {
            query,
            k,
            index_dir,
            json,
        } => {
            let store = open_index(&config, index_dir)?;
            let client = client(&config)?;
            let retrieved = Retriever::new(&client, &store)
                .retrieve(&query, k.unwrap_or(config.top_k()))
                .await?;
            if json {
                let hits: Vec<JsonHit> = retrieved
                    .iter()
                    .enumerate()
                    .map(|(i, r)| JsonHit {
                        rank: i + 1,
                        score: r.score,
                        text: &r.text,
                        metadata: &r.metadata,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if retrieved.is_empty() {
                println!("{}", NO_RESULTS);
            } else {
                for (i, r) in retrieved.iter().enumerate() {
                    println!("  {}. (similarity: {:.4}) {}", i + 1, r.score, preview(&r.text));
                }
            }
        }
        Commands::Ask {
            question,
            k,
            index_dir,
            no_llm,
        } => {
            let store = open_index(&config, index_dir)?;
            let client = client(&config)?;
            let retriever = Retriever::new(&client, &store);
            let generator = (!no_llm).then_some(&client as &dyn Generator);
            let answer = retriever
                .answer(&question, k.unwrap_or(config.top_k()), generator)
                .await?;
            println!("{}", answer);
        }
        Commands::Info { index_dir } => {
            let dir = resolve_index_dir(&config, index_dir)?;
            let store = NormalizedStore::open(&dir)?;
            println!("Index at {}", dir.display());
            println!("  records:   {}", store.count());
            match store.dimension() {
                Some(d) => println!("  dimension: {}", d),
                None => println!("  dimension: (empty)"),
            }
        }
    }
    Ok(())
}

fn resolve_index_dir(config: &Config, arg: Option<PathBuf>) -> Result<PathBuf, Box<dyn Error>> {
    let dir = arg
        .or_else(|| config.index_dir())
        .ok_or("could not determine index directory; pass --index-dir")?;
    tracing::debug!(path = %dir.display(), "using index directory");
    Ok(dir)
}

fn open_index(config: &Config, arg: Option<PathBuf>) -> Result<NormalizedStore, Box<dyn Error>> {
    let dir = resolve_index_dir(config, arg)?;
    Ok(NormalizedStore::open(&dir)?)
}

fn client(config: &Config) -> Result<OllamaClient, Box<dyn Error>> {
    Ok(OllamaClient::from_url(config.ollama_url())?
        .with_embed_model(config.embed_model())
        .with_generate_model(config.generate_model()))
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    match line.char_indices().nth(80) {
        Some((i, _)) => format!("{}...", &line[..i]),
        None => line.to_string(),
    }
}
