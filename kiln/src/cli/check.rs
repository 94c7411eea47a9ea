// kiln/src/cli/check.rs
use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::dependency::{resolve, RequirementOutcome};
use kiln_common::error::{KilnError, Result};
use kiln_common::formulary::Formulary;
use kiln_core::{check_all, detect_host_facts, SystemProbe};

use crate::cli::OptionFlags;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Recipe name
    pub name: String,

    #[command(flatten)]
    pub flags: OptionFlags,
}

impl CheckArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Formulary::new(config).load_recipe(&self.name)?;
        let options = self.flags.option_set();
        let config = config.clone();

        // Probes spawn processes and may sit on their timeout.
        let report = tokio::task::spawn_blocking(move || {
            let host = detect_host_facts(&config);
            let plan = resolve(&recipe, &options, &host);
            let probe = SystemProbe::new(&config);
            check_all(&plan.requirements, &probe)
        })
        .await
        .map_err(|e| KilnError::Generic(format!("JoinError in requirement check: {e}")))?;

        for (name, outcome) in &report.checked {
            match outcome {
                RequirementOutcome::Satisfied => println!("{} {}", "✓".green(), name),
                RequirementOutcome::Advisory(message) => {
                    println!("{} {}", "!".yellow(), name.yellow());
                    print_message(message);
                }
                // The message itself is reported as the command error.
                RequirementOutcome::Fatal(_) => println!("{} {}", "✗".red(), name.red()),
            }
        }
        for name in &report.skipped {
            println!("{} {} (skipped)", "-".dimmed(), name.dimmed());
        }

        match report.fatal {
            Some((name, message)) => Err(KilnError::UnsatisfiedRequirement { name, message }),
            None => Ok(()),
        }
    }
}

fn print_message(message: &str) {
    for line in message.trim_end().lines() {
        println!("    {line}");
    }
}
