// kiln/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::error::Result;
use kiln_common::formulary::Formulary;
use kiln_core::build::read_receipt;
use prettytable::{format, Cell, Row, Table};
use tracing::debug;

/// List available recipes and whether they are installed
#[derive(Args, Debug)]
pub struct List {
    /// Only show installed recipes
    #[arg(long)]
    pub installed: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formulary = Formulary::new(config);
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
            Cell::new("Options").style_spec("b"),
        ]));

        let mut shown = 0;
        for name in formulary.available() {
            let recipe = match formulary.load_recipe(&name) {
                Ok(recipe) => recipe,
                Err(e) => {
                    println!("{} skipping '{}': {}", "Warning:".yellow(), name, e);
                    continue;
                }
            };
            let keg = config.recipe_keg_path(&recipe.name, &recipe.version);
            let receipt = match read_receipt(&keg) {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    debug!("No receipt for {} at {}: {}", name, keg.display(), e);
                    None
                }
            };
            if self.installed && receipt.is_none() {
                continue;
            }
            let (installed, options) = match &receipt {
                Some(r) => ("✔", r.options.join(" ")),
                None => ("", String::new()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&recipe.name).style_spec("Fb"),
                Cell::new(&recipe.version),
                Cell::new(installed).style_spec("Fg"),
                Cell::new(&options),
            ]));
            shown += 1;
        }

        if shown == 0 {
            println!("{}", "0 recipes".yellow());
            return Ok(());
        }
        table.printstd();
        println!("{}", format!("{shown} recipes").bold());
        Ok(())
    }
}
