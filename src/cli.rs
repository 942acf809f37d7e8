use crate::config::InputSource;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tfc-workspace")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge Terraform Cloud workspaces from declarative inputs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Synthesize the configuration, import existing resources, plan and optionally apply
    Run(RunArgs),

    /// Print the synthesized configuration without running terraform
    Render(RenderArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: InputSource,

    /// Path to the terraform binary (default: found on PATH)
    #[arg(long, env = "INPUT_TERRAFORM_BIN")]
    pub terraform_bin: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: InputSource,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
