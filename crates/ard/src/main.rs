//! `ard` - check, run, build and format Ard programs.
//!
//! A binary produced by `ard build` carries its program after the executable
//! bytes. Such a binary runs that program on start instead of parsing its
//! command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ard::embedded::{current_executable, embedded_payload, run_embedded};
use ard::logging::init_logging;
use ard::pipeline::{self, PipelineError};
use ard::{VERSION, format};
use ard_vm::Host;
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "ard")]
#[command(about = "Toolchain for the Ard language")]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the toolchain version
    Version,

    /// Type-check a program and report diagnostics
    Check {
        /// Path to the `.ard` source file
        path: PathBuf,
    },

    /// Compile and run a program
    Run {
        /// Path to the `.ard` source file
        path: PathBuf,
    },

    /// Build a standalone executable embedding the program
    Build {
        /// Path to the `.ard` source file
        path: PathBuf,

        /// Output path (default: the input path without extension, or with `.out` if it has none)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Reformat a source file in place
    Format {
        /// Path to the `.ard` source file
        path: PathBuf,

        /// Report whether the file would change, without writing it
        #[arg(long)]
        check: bool,
    },

    /// Run the program embedded in this executable
    RunEmbedded,

    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> ExitCode {
    if let Some(payload) = embedded_payload() {
        init_logging(false);
        return report(pipeline::run_payload(&payload, Host::default()).map(|_| ExitCode::SUCCESS));
    }

    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(command = ?cli.command, "Starting");

    let result = match cli.command {
        Commands::Version => {
            println!("ard {VERSION}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { path } => check(&path),
        Commands::Run { path } => pipeline::run_file(&path, Host::default()).map(|_| ExitCode::SUCCESS),
        Commands::Build { path, out } => build(&path, out),
        Commands::Format { path, check } => format_file(&path, check),
        Commands::RunEmbedded => match run_embedded(Host::default()) {
            Ok(Some(_)) => Ok(ExitCode::SUCCESS),
            Ok(None) => {
                eprintln!("No embedded program");
                Ok(ExitCode::FAILURE)
            }
            Err(err) => Err(err),
        },
        Commands::External(args) => {
            debug!(?args, "Unrecognized subcommand");
            eprintln!("Unknown command");
            Ok(ExitCode::FAILURE)
        }
    };
    report(result)
}

fn report(result: Result<ExitCode, PipelineError>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path) -> Result<ExitCode, PipelineError> {
    let checked = pipeline::check_file(path)?;
    for line in checked.rendered() {
        eprintln!("{line}");
    }
    Ok(if checked.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build(path: &Path, out: Option<PathBuf>) -> Result<ExitCode, PipelineError> {
    let Some(host) = current_executable() else {
        eprintln!("Cannot locate the ard executable to build from");
        return Ok(ExitCode::FAILURE);
    };
    let built = pipeline::build_file(path, out, &host)?;
    println!("{}", built.display());
    Ok(ExitCode::SUCCESS)
}

fn format_file(path: &Path, check: bool) -> Result<ExitCode, PipelineError> {
    let source = std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let formatted = format::format_source(&source);
    if formatted == source {
        return Ok(ExitCode::SUCCESS);
    }
    if check {
        println!("Would reformat {}", path.display());
        return Ok(ExitCode::FAILURE);
    }
    std::fs::write(path, formatted).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    println!("Formatted {}", path.display());
    Ok(ExitCode::SUCCESS)
}
