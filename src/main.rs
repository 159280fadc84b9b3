//! p4stream - list depot files from Perforce tagged output.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use p4stream::p4::{DepotClient, DepotFile, FixedDepth};

#[derive(Parser)]
#[command(
    name = "p4stream",
    about = "List depot files from Perforce tagged output",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of leading path segments that form the stream root.
    #[arg(long, default_value_t = 1)]
    stream_depth: usize,

    /// Print records as JSON instead of columns.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files matching a depot pattern (p4 files).
    Files {
        /// Depot path pattern, e.g. //depot/main/...
        pattern: String,
    },
    /// List files opened for pending changelists (p4 opened).
    Opened,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn print_files(files: &[DepotFile], json: bool) -> serde_json::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(files)?);
        return Ok(());
    }
    for file in files {
        if file.action.is_empty() && file.cl.is_empty() && file.file_type.is_empty() {
            println!("{}", file.path);
        } else {
            println!(
                "{}\t{}\t{}\t{}",
                file.path, file.action, file.cl, file.file_type
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = DepotClient::with_shell(Arc::new(FixedDepth(cli.stream_depth)));
    let result = match cli.command {
        Commands::Files { pattern } => client.files(&pattern).await,
        Commands::Opened => client.opened().await,
    };

    match result {
        Ok(files) => match print_files(&files, cli.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
