// kiln/src/cli/plan.rs
use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::dependency::{resolve, DependencyTarget, ResolvedPlan};
use kiln_common::error::Result;
use kiln_common::formulary::Formulary;
use kiln_common::model::{BuildOptionSet, HostFacts, Recipe};
use kiln_core::detect_host_facts;
use prettytable::{format, Cell, Row, Table};

use crate::cli::OptionFlags;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Recipe name
    pub name: String,

    #[command(flatten)]
    pub flags: OptionFlags,
}

impl PlanArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Formulary::new(config).load_recipe(&self.name)?;
        let options = self.flags.option_set();
        let host = detect_host_facts(config);
        print_plan(&recipe, &options, &host, config);
        Ok(())
    }
}

/// Prints the resolved plan for one set of options.
pub fn print_plan(recipe: &Recipe, options: &BuildOptionSet, host: &HostFacts, config: &Config) {
    let plan = resolve(recipe, options, host);
    println!(
        "{} {} {} [{}]",
        "==>".bold().blue(),
        recipe.name.bold(),
        recipe.version,
        options
    );
    println!(
        "Host: {} {} (command line tools: {})",
        host.os,
        host.arch,
        if host.clt_installed { "yes" } else { "no" }
    );

    print_dependencies(&plan);

    if !plan.variants.is_empty() {
        let names: Vec<&str> = plan.variants.iter().map(|v| v.name.as_str()).collect();
        println!("{} {}", "Variants:".bold(), names.join(", "));
    }
    for name in plan.duplicate_targets() {
        println!(
            "{} '{}' is requested more than once",
            "Warning:".yellow(),
            name
        );
    }
    if !plan.substitutions.is_empty() {
        println!("{}", "Substitutions:".bold());
        for sub in &plan.substitutions {
            println!("  {}: {:?}", sub.file, sub.pattern);
        }
    }
    if !plan.patches.is_empty() {
        println!("{} {}", "Patches:".bold(), plan.patches.len());
    }
    for (path, _) in &plan.files {
        println!("{} {}", "Generates:".bold(), path);
    }
    for setting in &plan.env {
        println!("{} {}={}", "Env:".bold(), setting.key, setting.value);
    }
    println!(
        "{} {}",
        "Prefix:".bold(),
        config
            .recipe_keg_path(&recipe.name, &recipe.version)
            .display()
    );
}

fn print_dependencies(plan: &ResolvedPlan) {
    if plan.dependencies.is_empty() {
        println!("{}", "No dependencies".dimmed());
        return;
    }
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("Name").style_spec("b"),
        Cell::new("Type").style_spec("b"),
        Cell::new("Kind").style_spec("b"),
    ]));
    for spec in &plan.dependencies {
        let (kind_label, style) = match &spec.target {
            DependencyTarget::Package(_) => ("package", "Fb"),
            DependencyTarget::Requirement(req) if req.is_fatal() => ("requirement", "Fr"),
            DependencyTarget::Requirement(_) => ("advisory", "Fy"),
            DependencyTarget::Runtime(_) => ("runtime", "Fg"),
        };
        table.add_row(Row::new(vec![
            Cell::new(spec.name()).style_spec(style),
            Cell::new(kind_label),
            Cell::new(&spec.kind.to_string()),
        ]));
    }
    table.printstd();
}
