//! HashLog CLI
//!
//! Command-line interface for inspecting and editing a HashLog data file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hashlog::storage::LogRecovery;
use hashlog::{Compression, Config, Engine, RecoveryMode};
use tracing_subscriber::{fmt, EnvFilter};

/// HashLog CLI
#[derive(Parser, Debug)]
#[command(name = "hashlog-cli")]
#[command(about = "CLI for the HashLog key-value storage engine")]
#[command(version)]
struct Args {
    /// Data file
    #[arg(short, long, default_value = "./hashlog.data")]
    path: PathBuf,

    /// Store values verbatim instead of LZ4-compressing large ones
    #[arg(long)]
    no_compression: bool,

    /// Refuse to open a log with a torn tail instead of truncating it
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print index and file statistics
    Stats,

    /// Check every record checksum without modifying the file
    Verify,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> hashlog::Result<()> {
    let command = match args.command {
        Commands::Verify => return verify(&args.path),
        command => command,
    };

    let config = Config::builder()
        .path(&args.path)
        .compression(if args.no_compression {
            Compression::None
        } else {
            Compression::Lz4
        })
        .recovery_mode(if args.strict {
            RecoveryMode::Strict
        } else {
            RecoveryMode::TruncateTail
        })
        .build();

    let engine = Engine::open(config)?;

    match command {
        Commands::Get { key } => match engine.get(key.as_bytes()) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(e) if e.is_not_found() => println!("(nil)"),
            Err(e) => return Err(e),
        },
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.remove(key.as_bytes())?;
            println!("OK");
        }
        Commands::Stats => {
            let stats = engine.stats();
            println!("path:         {}", engine.path().display());
            println!("keys:         {}", stats.keys);
            println!("index memory: {} bytes", stats.index_memory_usage);
            println!("logical size: {} bytes", stats.logical_size);
        }
        // Read-only, handled without opening the engine
        Commands::Verify => {}
    }

    engine.close()
}

fn verify(path: &Path) -> hashlog::Result<()> {
    let result = LogRecovery::verify(path)?;
    println!("records:    {}", result.records_scanned);
    println!("values:     {}", result.values);
    println!("tombstones: {}", result.tombstones);
    println!("valid size: {}", result.valid_size);
    println!("file size:  {}", result.file_size);
    if let Some(offset) = result.torn_at {
        println!("torn tail at offset {}", offset);
    }
    Ok(())
}
