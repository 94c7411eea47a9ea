// kiln/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Args, Parser, Subcommand};
use kiln_common::config::Config;
use kiln_common::error::Result;
use kiln_common::model::BuildOptionSet;

pub mod check;
pub mod info;
pub mod install;
pub mod list;
pub mod plan;

use crate::cli::check::CheckArgs;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::plan::PlanArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "kiln", bin_name = "kiln")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check requirements, patch, build and install a recipe
    Install(InstallArgs),
    /// Show what a recipe would check and build for the given options
    Plan(PlanArgs),
    /// Run only the requirement checks of a recipe
    Check(CheckArgs),
    Info(Info),
    List(List),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Plan(command) => command.run(config).await,
            Self::Check(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
        }
    }
}

/// Build option flags shared by `install`, `plan` and `check`.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionFlags {
    /// Enable an optional feature, e.g. `--with openblas`
    #[arg(long = "with", value_name = "NAME")]
    pub with: Vec<String>,
    /// Disable a recommended feature, e.g. `--without python`
    #[arg(long = "without", value_name = "NAME")]
    pub without: Vec<String>,
    /// Pass a raw option flag, e.g. `--option with-python3`
    #[arg(long = "option", value_name = "FLAG", allow_hyphen_values = true)]
    pub raw: Vec<String>,
}

impl OptionFlags {
    pub fn option_set(&self) -> BuildOptionSet {
        self.with
            .iter()
            .map(|name| format!("with-{name}"))
            .chain(self.without.iter().map(|name| format!("without-{name}")))
            .chain(self.raw.iter().cloned())
            .collect()
    }
}
