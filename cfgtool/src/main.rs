use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod commands;

use commands::Project;

#[derive(Parser)]
#[command(name = "cfgtool", version)]
#[command(about = "Inspect and edit configuration projects", long_about = None)]
struct Cli {
    /// Store configuration (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more (repeat for trace output).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// Create a project holding the default configuration
    New {
        file: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the value of a single element
    Get { file: PathBuf, path: String },
    /// Set values in one transaction
    Set {
        file: PathBuf,
        /// Assignments of the form `path=value`
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Print a subtree as JSON, or replace it from a JSON file
    Bulk {
        file: PathBuf,
        path: String,
        /// JSON document replacing the subtree
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// List regions, boundaries, monitors and batch parameters
    Info { file: PathBuf },
    /// Check a project against the schema
    Validate { file: PathBuf },
    /// Upgrade a project to the current document version
    Migrate { file: PathBuf },
    /// Print the effective store configuration as TOML
    ConfigShow,
    /// Print the JSON Schema of the store configuration
    ConfigSchema,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {e:?}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut project = Project::new(cli.config.as_deref())?;

    match cli.command {
        SubCommands::New { file, force } => project.create(&file, force),
        SubCommands::Get { file, path } => project.get(&file, &path),
        SubCommands::Set { file, assignments } => project.set(&file, &assignments),
        SubCommands::Bulk { file, path, input } => project.bulk(&file, &path, input.as_deref()),
        SubCommands::Info { file } => project.info(&file),
        SubCommands::Validate { file } => project.validate(&file),
        SubCommands::Migrate { file } => project.migrate(&file),
        SubCommands::ConfigShow => project.show_config(),
        SubCommands::ConfigSchema => Project::print_config_schema(),
    }
}
