// kiln/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::error::Result;
use kiln_common::formulary::Formulary;
use kiln_core::build::TemplateContext;
use kiln_core::detect_host_facts;
use prettytable::{format, Cell, Row, Table};
use tracing::debug;

/// Show a recipe's metadata, options and dependencies
#[derive(Args, Debug)]
pub struct Info {
    /// Recipe name
    pub name: String,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Formulary::new(config).load_recipe(&self.name)?;

        println!("{} {}", recipe.name.green().bold(), recipe.version);
        if let Some(homepage) = &recipe.homepage {
            println!("{homepage}");
        }
        println!("{} {}", "From:".bold(), recipe.url);
        if let Some(head) = &recipe.head {
            println!("{} {}", "HEAD:".bold(), head);
        }

        let keg = config.recipe_keg_path(&recipe.name, &recipe.version);
        if keg.is_dir() {
            println!("{} {}", "Installed:".bold(), keg.display());
        } else {
            println!("{}", "Not installed".dimmed());
        }

        if !recipe.dependencies.is_empty() {
            println!("{}", "==> Dependencies".bold().blue());
            for spec in &recipe.dependencies {
                let platform = spec
                    .platform
                    .as_ref()
                    .map(|c| format!(" [{c:?}]"))
                    .unwrap_or_default();
                println!("  {} ({}){}", spec.name(), spec.kind, platform);
            }
        }

        let options = recipe.declared_options();
        if !options.is_empty() {
            println!("{}", "==> Options".bold().blue());
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_CLEAN);
            for option in &options {
                table.add_row(Row::new(vec![
                    Cell::new(&format!("--{}", option.name)).style_spec("b"),
                    Cell::new(&option.description),
                ]));
            }
            table.printstd();
        }
        for group in &recipe.exclusive_options {
            println!("  (only one of: {})", group.join(", "));
        }

        if let Some(caveats) = &recipe.caveats {
            let host = detect_host_facts(config);
            let text = match TemplateContext::new(config, &host, keg).expand(caveats) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Showing caveats unexpanded: {}", e);
                    caveats.clone()
                }
            };
            println!("{}", "==> Caveats".bold().blue());
            println!("{}", text.trim_end());
        }
        Ok(())
    }
}
