// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use hudl_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hudl")]
#[command(version)]
#[command(about = "Type-safe HTML templating: dev server, checker, formatter", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Quiet mode: only show errors (useful for CI)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the development server with live reload
    Dev {
        /// Port to run the dev server on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Templates directory (overrides hudl.toml)
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// Parse and validate every document under a directory
    Check {
        /// Directory to check (defaults to the configured templates dir)
        dir: Option<String>,
    },
    /// Format documents in place
    Fmt {
        /// Files or directories to format
        paths: Vec<String>,
        /// Verify formatting without writing; exits nonzero on differences
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Dev { port, host, dir } => {
            commands::dev::run(host, port, dir, cli.quiet).await
        }
        Commands::Check { dir } => commands::check::run(dir),
        Commands::Fmt { paths, check } => commands::fmt::run(paths, check),
    }
}
