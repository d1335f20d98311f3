mod commands;
mod metadata;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gradekit_common::config::RateLimitCaps;
use metadata::Field;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gradekit-cli")]
#[command(about = "Gradekit CLI - Inspect submission exports and rate limits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a student in a YAML submission export
    Lookup {
        /// Path to the export (submission_metadata.yml)
        metadata_file: PathBuf,

        /// Query like sid=3031234 or email=ada@example.edu
        query: String,

        /// Field to print for the match
        #[arg(value_enum, default_value_t = Field::SubmissionDir)]
        output: Field,
    },

    /// Show submission caps status for a submission_metadata.json file
    RateLimit {
        /// Path to submission_metadata.json
        metadata_file: PathBuf,

        /// Cap on total graded submissions
        #[arg(long)]
        max_total: Option<u32>,

        /// Cap on submissions in any 24 hours
        #[arg(long)]
        max_per_day: Option<u32>,

        /// Cap on submissions in any hour
        #[arg(long)]
        max_per_hour: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup {
            metadata_file,
            query,
            output,
        } => {
            if !commands::lookup_student(&metadata_file, &query, output)? {
                println!("No submission found for {}", query);
                std::process::exit(1);
            }
        }
        Commands::RateLimit {
            metadata_file,
            max_total,
            max_per_day,
            max_per_hour,
        } => {
            let caps = RateLimitCaps {
                max_total,
                max_per_day,
                max_per_hour,
            };
            commands::rate_limit_status(&metadata_file, caps)?;
        }
    }

    Ok(())
}
