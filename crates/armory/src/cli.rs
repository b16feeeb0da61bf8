//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Armory - unattended provisioning of security tooling
#[derive(Parser, Debug)]
#[command(name = "armory")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to armory.yaml catalog file
    #[arg(short, long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Provision every tool in the catalog
    Provision(ProvisionArgs),

    /// Catalog management
    #[command(subcommand)]
    Catalog(CatalogCommands),

    /// Print the latest provisioning report
    Report(ReportArgs),

    /// Check the host for the commands provisioning relies on
    Preflight(PreflightArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Provision command
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Run unattended: install baseline packages without confirmation
    #[arg(short = 'y', long)]
    pub auto: bool,

    /// Reuse previously acquired source trees; never clone or download
    #[arg(long)]
    pub skip_acquisition: bool,

    /// Timeout in seconds applied to every external command
    #[arg(short, long, default_value = "600")]
    pub timeout: u64,

    /// Root directory for trees, environments, logs, and reports
    #[arg(long)]
    pub root: Option<PathBuf>,
}

// Catalog commands
#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// Validate the catalog
    Validate(CatalogValidateArgs),

    /// List catalog entries
    List(CatalogListArgs),
}

#[derive(Args, Debug)]
pub struct CatalogValidateArgs {
    /// Path to catalog file (default: armory.yaml in the working directory)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CatalogListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Root directory (default: ~/.armory)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

// Preflight command
#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Completions command
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
