use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vault_sync_store::DEFAULT_NAMESPACE;

mod commands;
mod record;

/// vsync: Development tool for vault-sync collections.
///
/// Merge snapshot files offline, and inspect, export or import collections
/// stored in a SQLite database.
#[derive(Parser)]
#[command(name = "vsync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a remote snapshot file into a local one and print the report.
    Merge {
        /// Path to the local snapshot (JSON).
        local: String,

        /// Path to the remote snapshot (JSON). Never modified.
        remote: String,

        /// Write the merged collection back to the local file.
        #[arg(long)]
        write: bool,

        /// Merge time in epoch milliseconds. Defaults to the system clock.
        #[arg(long)]
        now: Option<u64>,
    },

    /// List stored collections, or show one collection's watermark.
    Inspect {
        /// Path to the SQLite database file.
        db: String,

        /// Collection key. If omitted, lists all keys.
        key: Option<String>,

        /// Namespace to scope the lookup.
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Print a stored collection as a raw snapshot.
    Export {
        /// Path to the SQLite database file.
        db: String,

        /// Collection key.
        key: String,

        /// Namespace to read from.
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// Validate a raw snapshot file and store it.
    Import {
        /// Path to the SQLite database file.
        db: String,

        /// Collection key.
        key: String,

        /// Path to the snapshot (JSON).
        file: String,

        /// Namespace to write to.
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Merge {
            local,
            remote,
            write,
            now,
        } => commands::merge(&local, &remote, write, now),
        Commands::Inspect { db, key, namespace } => {
            commands::inspect(&db, key.as_deref(), namespace.as_deref())
        }
        Commands::Export { db, key, namespace } => commands::export(&db, &key, &namespace),
        Commands::Import {
            db,
            key,
            file,
            namespace,
        } => commands::import(&db, &key, &file, &namespace),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
