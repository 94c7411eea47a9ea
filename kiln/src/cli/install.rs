// kiln/src/cli/install.rs
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use kiln_aio::extract::extract_source_archive_async;
use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use kiln_common::formulary::Formulary;
use kiln_core::{detect_host_facts, RecipeRunner, RunReport, SystemBuildTool, SystemProbe};
use kiln_net::fetch_source_archive;
use tracing::{debug, instrument};

use crate::cli::plan::print_plan;
use crate::cli::OptionFlags;

const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Recipe name
    pub name: String,

    #[command(flatten)]
    pub flags: OptionFlags,

    /// Build an already unpacked source tree instead of downloading
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Skip the recipe's self-test
    #[arg(long)]
    pub no_test: bool,

    /// Print the resolved plan and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config), fields(recipe = %self.name))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Formulary::new(config).load_recipe(&self.name)?;
        let options = self.flags.option_set();
        let host = detect_host_facts(config);

        if self.dry_run {
            print_plan(&recipe, &options, &host, config);
            return Ok(());
        }

        // Held until the build is over; dropping it removes the unpacked tree.
        let (_scratch, source_root) = match &self.source_dir {
            Some(dir) => (None, dir.clone()),
            None => {
                println!("{} Downloading {}", "==>".bold().blue(), recipe.url);
                let archive =
                    fetch_source_archive(&recipe.name, &recipe.url, &recipe.checksum, config)
                        .await?;
                fs::create_dir_all(config.tmp_dir())?;
                let scratch = tempfile::Builder::new()
                    .prefix(&format!("{}-", recipe.name))
                    .tempdir_in(config.tmp_dir())?;
                let root = extract_source_archive_async(&archive, scratch.path()).await?;
                (Some(scratch), root)
            }
        };
        if !source_root.is_dir() {
            return Err(KilnError::NotFound(format!(
                "Source directory {} does not exist",
                source_root.display()
            )));
        }
        debug!("Building from {}", source_root.display());

        let run_tests = !self.no_test && !config.skip_tests;
        let config = config.clone();
        let recipe = Arc::clone(&recipe);
        let (result, advisories) = tokio::task::spawn_blocking(move || {
            let probe = SystemProbe::new(&config);
            let tool = SystemBuildTool;
            let mut runner = RecipeRunner::new(
                &recipe,
                &config,
                options,
                host,
                source_root,
                &probe,
                &tool,
            )
            .with_tests(run_tests);
            let result = runner.run();
            (result, runner.advisories().to_vec())
        })
        .await
        .map_err(|e| KilnError::Generic(format!("JoinError in recipe build: {e}")))?;

        print_advisories(&advisories);
        match result {
            Ok(report) => {
                print_report(&report);
                Ok(())
            }
            Err(e) => {
                print_failure_output(&e);
                Err(e)
            }
        }
    }
}

fn print_advisories(advisories: &[String]) {
    for message in advisories {
        println!("{} {}", "Warning:".yellow(), message.trim_end());
    }
}

fn print_report(report: &RunReport) {
    for failure in &report.test_failures {
        println!("{} {}", "Warning:".yellow(), failure);
    }
    println!(
        "{} {} {} installed to {}",
        "==>".bold().blue(),
        report.recipe.green().bold(),
        report.version,
        report.keg_path.display()
    );
    if let Some(caveats) = &report.caveats {
        println!("{}", "==> Caveats".bold().blue());
        println!("{}", caveats.trim_end());
    }
}

fn print_failure_output(error: &KilnError) {
    let (stdout, stderr) = match error {
        KilnError::BuildFailure { stdout, stderr, .. } => (stdout.as_str(), stderr.as_str()),
        _ => return,
    };
    for (label, text) in [("stdout", stdout), ("stderr", stderr)] {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            continue;
        }
        let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        eprintln!("{}", format!("Last lines of {label}:").bold());
        for line in &lines[start..] {
            eprintln!("  {line}");
        }
    }
}
