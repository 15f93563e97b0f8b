use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use fsv_core::CaptureOptions;

mod commands;
mod output;

use commands::reference::ReferenceArgs;
use output::Output;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the standard scenarios against the configured archiver.
    /// Exits non-zero when any scenario fails.
    Run {
        /// Only run these scenarios (repeatable)
        #[clap(long = "scenario", value_name = "NAME")]
        scenarios: Vec<String>,
        /// Use the built-in reference archiver instead of the configured one
        #[clap(long)]
        reference: bool,
    },
    /// Captures and prints a snapshot of PATH
    Snapshot {
        path: PathBuf,
        /// Directory PATH is resolved against; keys are relative to it
        #[clap(long, default_value = ".")]
        base: PathBuf,
    },
    /// Compares the same root under two bases. Exits non-zero on differences
    Diff {
        left_base: PathBuf,
        right_base: PathBuf,
        /// Root to compare (default: the configured subject)
        #[clap(long)]
        root: Option<PathBuf>,
    },
    /// Lists the standard scenarios
    List,
    /// Writes a default `fsv.toml` in the current directory
    Init,
    /// Runs the reference archiver with an fsarchive-style command line
    ReferenceArchiver(ReferenceArgs),
}

#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Output results as JSON
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

fn try_main() -> Result<bool> {
    env_logger::init();

    let cli = Cli::parse();
    let output = Output::new(cli.json);
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Run {
            scenarios,
            reference,
        } => {
            let (root, config) = commands::load_config(&current_dir)?;
            commands::run::run(&output, &root, &config, &scenarios, reference)
        }
        Command::Snapshot { path, base } => {
            let (_, config) = commands::load_config(&current_dir)?;
            let base = current_dir.join(base);
            commands::snapshot::run(&output, &base, &path, CaptureOptions::from(&config))
        }
        Command::Diff {
            left_base,
            right_base,
            root,
        } => {
            let (_, config) = commands::load_config(&current_dir)?;
            let root = root.unwrap_or_else(|| config.subject.clone());
            commands::diff::run(
                &output,
                &current_dir.join(left_base),
                &current_dir.join(right_base),
                &root,
                CaptureOptions::from(&config),
            )
        }
        Command::List => {
            let (_, config) = commands::load_config(&current_dir)?;
            commands::list::run(&output, &config.subject)
        }
        Command::Init => commands::init::run(&output, &current_dir),
        Command::ReferenceArchiver(args) => commands::reference::run(&current_dir, args),
    }
}

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => ::std::process::exit(1),
        Err(e) => {
            eprintln!("{e:?}");
            ::std::process::exit(1)
        }
    }
}
