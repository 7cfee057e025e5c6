//! ctree CLI - Command line interface for ctree_db
//!
//! Each invocation opens the store, runs one command and flushes before
//! exiting, so state carries over between invocations.

use clap::{Parser, Subcommand};
use ctree_db::{Database, KvStore, StorageKey, TreeConfig, DEFAULT_TREE_DIRNAME};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ctree")]
#[command(about = "A persistent commitment trie backed by an append-only node log")]
#[command(version)]
struct Cli {
    /// Directory holding the node log
    #[arg(short, long, default_value = DEFAULT_TREE_DIRNAME)]
    directory: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Treat keys and values as hex instead of UTF-8
    #[arg(long)]
    hex: bool,

    /// fsync the flush batch before exiting
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or overwrite a key
    Insert {
        key: String,
        value: String,
    },

    /// Read a key
    Get {
        key: String,
    },

    /// Print the current commitment
    Commit,

    /// Write back any unflushed nodes
    Flush,

    /// Show residency counts and store size
    Stats,

    /// Dump the serialized node stored at a trie path
    Node {
        /// Absolute trie path of the node (empty for the root)
        #[arg(default_value = "")]
        path: String,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = TreeConfig::load(&cli.directory)?;
    if cli.sync {
        config.sync_writes = true;
    }
    let db = Database::open(&config)?;
    let mut status = ExitCode::SUCCESS;

    match &cli.command {
        Commands::Insert { key, value } => {
            let key_bytes = decode(key, cli.hex)?;
            db.insert(&key_bytes, &decode(value, cli.hex)?)?;
            let commitment = db.commit()?;
            let flushed = db.flush()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "commitment": commitment.to_hex(),
                    "flushed": flushed
                }),
            );
        }

        Commands::Get { key } => match db.get(&decode(key, cli.hex)?)? {
            Some(value) => {
                output(
                    &cli.format,
                    &serde_json::json!({
                        "key": key,
                        "value": encode(&value, cli.hex)
                    }),
                );
            }
            None => {
                output(
                    &cli.format,
                    &serde_json::json!({
                        "status": "error",
                        "message": format!("Key not found: {}", key)
                    }),
                );
                status = ExitCode::FAILURE;
            }
        },

        Commands::Commit => {
            let commitment = db.commit()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "commitment": commitment.to_hex()
                }),
            );
        }

        Commands::Flush => {
            let flushed = db.flush()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "flushed": flushed
                }),
            );
        }

        Commands::Stats => {
            let stats = db.stats();
            output(
                &cli.format,
                &serde_json::json!({
                    "directory": cli.directory.display().to_string(),
                    "log": db.store().path().display().to_string(),
                    "records": db.store().len(),
                    "log_bytes": db.store().log_size(),
                    "resident": stats.resident,
                    "hollow": stats.hollow,
                    "dirty": stats.dirty
                }),
            );
        }

        Commands::Node { path } => {
            let key = StorageKey::for_path(&decode(path, cli.hex)?);
            let bytes = db.resolve_node(&key)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "key": key.to_string(),
                    "size": bytes.len(),
                    "bytes": hex::encode(&bytes)
                }),
            );
        }
    }

    db.close()?;
    Ok(status)
}

fn decode(input: &str, is_hex: bool) -> anyhow::Result<Vec<u8>> {
    if is_hex {
        hex::decode(input).map_err(|e| anyhow::anyhow!("Invalid hex '{}': {}", input, e))
    } else {
        Ok(input.as_bytes().to_vec())
    }
}

fn encode(bytes: &[u8], is_hex: bool) -> String {
    if is_hex {
        hex::encode(bytes)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(err) => eprintln!("failed to render output: {}", err),
    }
}
