//! Graft CLI - command-line host for the Graft bytecode transformer.

mod catalog;
mod commands;
mod output;
mod root;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "GRAFT_LOG";

#[derive(Parser)]
#[command(name = "graft")]
#[command(author, version, about = "Launch-time bytecode transformation for JVM class files")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration documents
    Init {
        /// Installation root (current directory if not specified)
        root: Option<PathBuf>,
    },

    /// List plugin archives and the entries attributed to them
    Discover {
        /// Installation root (searched upwards if not specified)
        root: Option<PathBuf>,

        /// Classpath directory searched for plugin manifests
        #[arg(long = "classpath", value_name = "DIR")]
        classpath: Vec<PathBuf>,
    },

    /// Summarize a class file
    Inspect {
        /// Path to a .class file
        class: PathBuf,
    },

    /// Transform a directory of class files
    Transform {
        /// Installation root
        root: PathBuf,

        /// Directory of .class files
        input: PathBuf,

        /// Directory receiving the transformed classes
        output: PathBuf,

        /// Classpath directory searched for plugin manifests
        #[arg(long = "classpath", value_name = "DIR")]
        classpath: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { root } => commands::init::execute(root),
        Commands::Discover { root, classpath } => {
            let root = root::resolve(root)?;
            commands::discover::execute(&root, &classpath)
        }
        Commands::Inspect { class } => commands::inspect::execute(&class),
        Commands::Transform {
            root,
            input,
            output,
            classpath,
        } => commands::transform::execute(&root, &input, &output, &classpath),
    }
}
