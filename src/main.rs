use anyhow::Context;
use clap::Parser;
use d2::{AnalysisError, Repository, SyncSkeleton};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(author, version, about = "d2 - Post-Mortem Deadlock Detection Tool")]
struct Cli {
    /// Path of the repository to examine
    repo: PathBuf,

    /// Perform the analysis for deadlocks
    #[clap(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    analyze: bool,

    /// Produce statistics about the usage of locks and threads
    #[clap(long)]
    stats: bool,

    /// Print the reports as JSON, one per line
    #[clap(long)]
    json: bool,

    /// Enable special debugging output
    #[clap(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_error(&error, cli.debug);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let repository = Repository::open(&cli.repo)?;
    let skeleton = SyncSkeleton::from_repository(&repository)?;

    if cli.analyze {
        for deadlock in skeleton.deadlocks() {
            if cli.json {
                let line = serde_json::to_string(&deadlock)
                    .context("unable to serialize a report")?;
                println!("{line}");
            } else {
                println!("\n{}", "-".repeat(80));
                print!("{deadlock}");
            }
        }
    }

    if cli.stats {
        println!("number of threads: {}", skeleton.number_of_threads());
        println!("number of distinct locks: {}", skeleton.number_of_locks());
    }

    Ok(())
}

fn report_error(error: &anyhow::Error, debug: bool) {
    match error.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::RepositoryIo { path, .. }) => {
            eprintln!("unable to open the repository at {}", path.display());
        }
        Some(AnalysisError::EventTypeMismatch { expected, actual }) => {
            eprintln!(
                "error while loading the data:\n    \
                 encountered an event of type {actual}\n    \
                 while expecting an event of type {expected}"
            );
        }
        Some(AnalysisError::UnexpectedRelease { thread, lock }) => {
            eprintln!(
                "error while building the graphs:\n    \
                 lock {lock} was unexpectedly released by thread {thread}"
            );
        }
        Some(AnalysisError::CorruptRecord { record }) => {
            eprintln!("error while loading the data:\n    malformed event record {record:?}");
        }
        None => eprintln!("encountered an unknown problem: {error:#}"),
    }

    if debug {
        eprintln!("{error:?}");
    }
}
