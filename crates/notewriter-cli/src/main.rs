mod run;
mod wiring;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "notewriter")]
#[command(about = "Drafts Community Notes for posts eligible for notes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print posts currently eligible for notes as JSON lines
    Eligible {
        /// Number of eligible posts to request
        #[arg(long, default_value_t = 2)]
        max_results: u32,

        /// Query live eligibility instead of the test-mode feed
        #[arg(long)]
        live: bool,
    },
    /// Draft notes for eligible posts and print one result per post as JSON lines
    Run {
        /// Number of eligible posts to request
        #[arg(long, default_value_t = 2)]
        max_results: u32,

        /// Use live mode for fetching and submitting instead of test mode
        #[arg(long)]
        live: bool,

        /// Submit drafted notes that pass validation
        #[arg(long)]
        submit: bool,

        /// Seed for comment sampling (overrides NOTEWRITER_SAMPLE_SEED)
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = notewriter_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eligible { max_results, live } => {
            run::run_eligible(&config, max_results, !live).await?;
        }
        Commands::Run {
            max_results,
            live,
            submit,
            seed,
        } => {
            if seed.is_some() {
                config.sample_seed = seed;
            }
            let options = run::RunOptions {
                max_results,
                test_mode: !live,
                submit,
            };
            run::run_notes(&config, options).await?;
        }
    }

    Ok(())
}
