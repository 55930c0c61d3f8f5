use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gradle_analysis::prelude::*;
use human_panic::setup_panic;
use tracing::{Level, enabled, error, info};

/// gradle-analysis
///
/// Runs the `staticAnalys` task of a Gradle project through its wrapper,
/// shows the tool output while it runs and reports a single verdict:
/// passed, failed with the issue summary, or undetermined.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    logging: LoggingOpts,

    #[clap(flatten)]
    config: ConfigOptions,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
struct VersionArgs {
    #[arg(long, action)]
    pub short: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the static analysis of the project and report its result.
    #[clap(alias("r"))]
    Run(AnalyzeArgs),
    /// Classify previously captured analysis output.
    #[clap(alias("c"))]
    Classify(ClassifyArgs),
    /// Print version info and exit
    #[clap(alias("v"))]
    Version(VersionArgs),
}

#[tokio::main]
async fn main() {
    setup_panic!();
    dotenvy::dotenv().ok();
    let opts = Cli::parse();

    let run_id = opts.config.get_run_id();
    let (guard, file_location) = match opts.logging.configure_logging(&run_id, "root") {
        Ok(configured) => configured,
        Err(e) => {
            eprintln!("Unable to configure logging: {}", e);
            std::process::exit(2);
        }
    };
    let error_code = run_subcommand(opts, &file_location).await;

    if error_code != 0 || enabled!(Level::DEBUG) {
        info!(target: "user", "More detailed logs at {}", file_location);
    }

    drop(guard);
    std::process::exit(error_code);
}

async fn run_subcommand(opts: Cli, file_location: &str) -> i32 {
    let loaded_config = match opts.config.load_config() {
        Err(e) => {
            error!(target: "user", "Failed to load configuration: {}", e);
            return 2;
        }
        Ok(c) => c,
    };

    handle_commands(&loaded_config, &opts.command, file_location)
        .await
        .unwrap_or_else(|e| {
            error!(target: "user", "Critical Error. {}", e);
            1
        })
}

async fn handle_commands(
    found_config: &FoundConfig,
    command: &Command,
    file_location: &str,
) -> Result<i32> {
    match command {
        Command::Run(args) => analyze_root(found_config, args, file_location).await,
        Command::Classify(args) => classify_root(found_config, args).await,
        Command::Version(args) => print_version(args).await,
    }
}

async fn print_version(args: &VersionArgs) -> Result<i32> {
    if args.short {
        println!("gradle-analysis {}", env!("CARGO_PKG_VERSION"));
    } else {
        info!(target: "user", "{}: {:60}", "Version".white().bold(), env!("CARGO_PKG_VERSION"));
        info!(target: "user", "{}: {:60}", "Build Timestamp".white().bold(), env!("VERGEN_BUILD_TIMESTAMP"));
        info!(target: "user", "{}: {:60}", "Describe".white().bold(), env!("VERGEN_GIT_DESCRIBE"));
        info!(target: "user", "{}: {:60}", "Commit SHA".white().bold(), env!("VERGEN_GIT_SHA"));
        info!(target: "user", "{}: {:60}", "Commit Date".white().bold(), env!("VERGEN_GIT_COMMIT_DATE"));
    }

    Ok(0)
}
