//! Selfquery CLI: ask natural-language questions of a YAML corpus.
//!
//! Usage:
//!   selfquery [--config path] query <text> --corpus path [--scores]
//!   selfquery [--config path] translate <text>
//!   selfquery [--config path] schema

use clap::{Parser, Subcommand};
use selfquery::config::default_config_path;
use selfquery::{
    Corpus, Embedder, SchemaRegistry, SelfQueryConfig, SelfQueryRetriever, SubprocessModel,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "selfquery",
    version,
    about = "Self-querying retrieval over a metadata + vector store"
)]
struct Cli {
    /// Path to config.yaml (default: ~/.config/selfquery/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a query against a corpus
    Query {
        /// Natural-language query
        text: String,
        /// YAML file with a `documents:` list
        #[arg(long)]
        corpus: PathBuf,
        /// Print similarity scores
        #[arg(long)]
        scores: bool,
    },
    /// Show how a query is translated, without retrieving
    Translate {
        /// Natural-language query
        text: String,
    },
    /// Print the attribute schema as the translator sees it
    Schema,
}

fn load_config(path: Option<PathBuf>) -> Result<SelfQueryConfig, String> {
    let path = path
        .or_else(default_config_path)
        .ok_or_else(|| "no config path given and no config directory found".to_string())?;
    SelfQueryConfig::load(&path).map_err(|e| e.to_string())
}

fn build_embedder() -> Result<Arc<dyn Embedder>, String> {
    #[cfg(feature = "embeddings")]
    {
        let embedder = selfquery::embedding::FastEmbedEmbedder::default_model()
            .map_err(|e| format!("failed to load embedding model: {}", e))?;
        Ok(Arc::new(embedder))
    }
    #[cfg(not(feature = "embeddings"))]
    {
        Ok(Arc::new(selfquery::HashingEmbedder::default()))
    }
}

fn build_retriever(config: &SelfQueryConfig) -> Result<SelfQueryRetriever, String> {
    let schema = Arc::new(config.schema().map_err(|e| e.to_string())?);
    let model = Arc::new(SubprocessModel::new(config.model.clone()));
    Ok(SelfQueryRetriever::with_model(
        schema,
        build_embedder()?,
        model,
        config.retriever.clone(),
    ))
}

async fn cmd_query(config: &SelfQueryConfig, text: &str, corpus: &Path, scores: bool) -> i32 {
    let retriever = match build_retriever(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let corpus = match Corpus::load(corpus) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let documents = corpus
        .documents
        .into_iter()
        .map(|d| (d.content, d.metadata))
        .collect();
    if let Err(e) = retriever.add_documents(documents).await {
        eprintln!("Error: failed to ingest corpus: {}", e);
        return 1;
    }

    match retriever.retrieve_with_scores(text).await {
        Ok(results) if results.is_empty() => {
            println!("No matching documents.");
            0
        }
        Ok(results) => {
            for (rank, (doc, score)) in results.iter().enumerate() {
                let title = doc.text_field("title").unwrap_or("(untitled)");
                if scores {
                    println!("{:>3}. {:<40} {:.4}", rank + 1, title, score);
                } else {
                    println!("{:>3}. {}", rank + 1, title);
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_translate(config: &SelfQueryConfig, text: &str) -> i32 {
    let retriever = match build_retriever(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match retriever.translate(text).await {
        Ok(structured) => match serde_json::to_string_pretty(&structured) {
            Ok(json) => {
                println!("{}", structured);
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_schema(config: &SelfQueryConfig) -> i32 {
    let schema = match config.schema() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("{:<16}  {:<12}  {:<32}  DESCRIPTION", "NAME", "TYPE", "OPERATORS");
    println!("{}", "-".repeat(88));
    for attr in schema.attributes() {
        let ops: Vec<&str> = SchemaRegistry::allowed_operators(attr.value_type)
            .iter()
            .map(|c| c.as_str())
            .collect();
        let name = if attr.optional {
            format!("{}?", attr.name)
        } else {
            attr.name.clone()
        };
        println!(
            "{:<16}  {:<12}  {:<32}  {}",
            name,
            attr.value_type.to_string(),
            ops.join(","),
            attr.description
        );
    }
    0
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Schema => cmd_schema(&config),
        command => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("failed to create tokio runtime: {}", e);
                    std::process::exit(1);
                }
            };
            rt.block_on(async {
                match command {
                    Commands::Query {
                        text,
                        corpus,
                        scores,
                    } => cmd_query(&config, &text, &corpus, scores).await,
                    Commands::Translate { text } => cmd_translate(&config, &text).await,
                    Commands::Schema => cmd_schema(&config),
                }
            })
        }
    };
    std::process::exit(code);
}
