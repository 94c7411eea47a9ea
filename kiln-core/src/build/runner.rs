// kiln-core/src/build/runner.rs
//! Drives one recipe from requirement checks to an installed keg.
//!
//! ```text
//! Init -> RequirementsChecked -> Patched -> Built -> [Tested] -> Done
//!   \___________\______________> Aborted
//!                                Patched/Built ---------------> Failed
//! ```

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use kiln_common::config::Config;
use kiln_common::dependency::{resolve, ResolvedPlan};
use kiln_common::error::{KilnError, Result};
use kiln_common::model::{BuildOptionSet, CommandTemplate, HostFacts, Recipe};
use tracing::{debug, error, info, warn};

use super::env::BuildEnvironment;
use super::inreplace::inreplace;
use super::patch::apply_patch;
use super::receipt::{write_receipt, InstallReceipt};
use super::template::TemplateContext;
use super::tool::{BuildTool, Invocation};
use crate::check::{check_all, HostProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    RequirementsChecked,
    Patched,
    Built,
    Tested,
    Done,
    Aborted,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::RequirementsChecked => "requirements-checked",
            Self::Patched => "patched",
            Self::Built => "built",
            Self::Tested => "tested",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub recipe: String,
    pub version: String,
    pub state: RunState,
    pub plan: ResolvedPlan,
    /// Messages of unsatisfied advisory requirements, in declaration order.
    pub advisories: Vec<String>,
    /// Self-test failures; these never undo the install.
    pub test_failures: Vec<KilnError>,
    /// Command lines of the build invocations, in the order they ran.
    pub builds: Vec<String>,
    pub keg_path: PathBuf,
    pub caveats: Option<String>,
}

/// One pass of the build: a runtime variant, or the single default pass
/// for recipes without variants.
#[derive(Debug, Clone)]
struct Pass {
    label: String,
    build: Vec<Invocation>,
    test: Vec<Invocation>,
}

/// Everything a run writes or spawns, expanded before any of it happens.
#[derive(Debug, Clone)]
struct Prepared {
    substitutions: Vec<(String, String, String)>,
    files: Vec<(String, String)>,
    env: BuildEnvironment,
    passes: Vec<Pass>,
    caveats: Option<String>,
}

pub struct RecipeRunner<'a> {
    recipe: &'a Recipe,
    config: &'a Config,
    options: BuildOptionSet,
    host: HostFacts,
    source_root: PathBuf,
    probe: &'a dyn HostProbe,
    tool: &'a dyn BuildTool,
    run_tests: bool,
    home: Option<PathBuf>,
    state: RunState,
    history: Vec<RunState>,
    advisories: Vec<String>,
}

impl<'a> RecipeRunner<'a> {
    pub fn new(
        recipe: &'a Recipe,
        config: &'a Config,
        options: BuildOptionSet,
        host: HostFacts,
        source_root: impl Into<PathBuf>,
        probe: &'a dyn HostProbe,
        tool: &'a dyn BuildTool,
    ) -> Self {
        Self {
            recipe,
            config,
            options,
            host,
            source_root: source_root.into(),
            probe,
            tool,
            run_tests: !config.skip_tests,
            home: None,
            state: RunState::Init,
            history: vec![RunState::Init],
            advisories: Vec::new(),
        }
    }

    pub fn with_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }

    /// Overrides the directory `{home}` expands to.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with `Init`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Advisory messages gathered so far; still available after an abort.
    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }

    /// Runs the recipe to a terminal state.
    ///
    /// `Err` leaves the runner in `Aborted` (nothing was built) or `Failed`
    /// (the build tool failed); the error is the sole reason.
    pub fn run(&mut self) -> Result<RunReport> {
        if self.state != RunState::Init {
            return Err(KilnError::Generic(format!(
                "Runner for '{}' already used (state: {})",
                self.recipe.name, self.state
            )));
        }
        info!(
            "Building {} {} with options [{}]",
            self.recipe.name, self.recipe.version, self.options
        );

        if let Err(e) = self.check_options() {
            return Err(self.abort(e));
        }
        let plan = resolve(self.recipe, &self.options, &self.host);
        for name in plan.duplicate_targets() {
            warn!(
                "'{}' is requested by more than one enabled dependency of {}",
                name, self.recipe.name
            );
        }

        let report = check_all(&plan.requirements, self.probe);
        self.advisories = report.advisories.clone();
        for message in &self.advisories {
            debug!("Advisory: {}", message.trim_end());
        }
        if let Some((name, message)) = report.fatal {
            return Err(self.abort(KilnError::UnsatisfiedRequirement { name, message }));
        }
        self.transition(RunState::RequirementsChecked);

        let keg_path = self
            .config
            .recipe_keg_path(&self.recipe.name, &self.recipe.version);
        let prepared = match self.prepare(&plan, &keg_path) {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.abort(e)),
        };
        if let Err(e) = self.apply_source_changes(&plan, &prepared) {
            return Err(self.abort(e));
        }
        self.transition(RunState::Patched);

        let builds = match self.build(&prepared, &keg_path) {
            Ok(builds) => builds,
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(RunState::Built);

        let receipt = InstallReceipt {
            name: self.recipe.name.clone(),
            version: self.recipe.version.clone(),
            options: self.options.iter().map(str::to_string).collect(),
            variants: plan.variants.iter().map(|v| v.name.clone()).collect(),
            dependencies: plan.dependencies.iter().map(|d| d.name().to_string()).collect(),
            advisories: self.advisories.clone(),
            built_at: Utc::now(),
        };
        if let Err(e) = write_receipt(&keg_path, &receipt) {
            return Err(self.fail(e));
        }

        let test_failures = if self.run_tests && !self.recipe.test.is_empty() {
            let failures = self.test(&prepared);
            self.transition(RunState::Tested);
            failures
        } else {
            debug!("Skipping self-test for {}", self.recipe.name);
            Vec::new()
        };
        self.transition(RunState::Done);
        info!(
            "Installed {} {} into {}",
            self.recipe.name,
            self.recipe.version,
            keg_path.display()
        );

        Ok(RunReport {
            recipe: self.recipe.name.clone(),
            version: self.recipe.version.clone(),
            state: self.state,
            plan,
            advisories: self.advisories.clone(),
            test_failures,
            builds,
            keg_path,
            caveats: prepared.caveats.clone(),
        })
    }

    fn transition(&mut self, next: RunState) {
        debug!("{}: {} -> {}", self.recipe.name, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn abort(&mut self, reason: KilnError) -> KilnError {
        error!("Aborting {}: {}", self.recipe.name, reason);
        self.transition(RunState::Aborted);
        reason
    }

    fn fail(&mut self, reason: KilnError) -> KilnError {
        error!("Build of {} failed: {}", self.recipe.name, reason);
        self.transition(RunState::Failed);
        reason
    }

    /// Unknown flags are only warned about; a broken exclusive group aborts.
    fn check_options(&self) -> Result<()> {
        let declared: HashSet<String> = self
            .recipe
            .declared_options()
            .into_iter()
            .map(|o| o.name)
            .collect();
        for flag in self.options.iter() {
            if !declared.contains(flag) {
                warn!("Unknown option '{}' for {}; ignoring", flag, self.recipe.name);
            }
        }
        for group in &self.recipe.exclusive_options {
            let selected: Vec<&str> = group
                .iter()
                .map(String::as_str)
                .filter(|flag| self.options.contains(flag))
                .collect();
            if selected.len() > 1 {
                return Err(KilnError::ConflictingOptions(format!(
                    "{} cannot be combined",
                    selected.join(" and ")
                )));
            }
        }
        Ok(())
    }

    fn template_context(&self, keg_path: &Path) -> TemplateContext {
        let ctx = TemplateContext::new(self.config, &self.host, keg_path.to_path_buf());
        match &self.home {
            Some(home) => ctx.with_home(home.clone()),
            None => ctx,
        }
    }

    fn prepare(&self, plan: &ResolvedPlan, keg_path: &Path) -> Result<Prepared> {
        let ctx = self.template_context(keg_path);

        let substitutions = plan
            .substitutions
            .iter()
            .map(|s| -> Result<(String, String, String)> {
                Ok((s.file.clone(), s.pattern.clone(), ctx.expand(&s.replacement)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let files = plan
            .files
            .iter()
            .map(|(path, content)| -> Result<(String, String)> {
                Ok((path.clone(), ctx.expand(content)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let prefixes: Vec<PathBuf> = plan
            .packages()
            .into_iter()
            .map(|name| self.config.recipe_opt_path(name))
            .collect();
        let mut env = BuildEnvironment::new(self.config, &self.host, &prefixes);
        for setting in &plan.env {
            env.set(setting.key.clone(), ctx.expand(&setting.value)?);
        }

        let mut passes = Vec::new();
        if plan.variants.is_empty() {
            passes.push(self.pass("default", &ctx, &env)?);
        } else {
            for variant in &plan.variants {
                let variant_ctx = ctx.for_variant(&variant.program);
                passes.push(self.pass(&variant.name, &variant_ctx, &env)?);
            }
        }

        let caveats = self
            .recipe
            .caveats
            .as_deref()
            .map(|text| ctx.expand(text))
            .transpose()?;

        Ok(Prepared {
            substitutions,
            files,
            env,
            passes,
            caveats,
        })
    }

    fn pass(&self, label: &str, ctx: &TemplateContext, env: &BuildEnvironment) -> Result<Pass> {
        let expand = |commands: &[CommandTemplate]| -> Result<Vec<Invocation>> {
            commands
                .iter()
                .map(|command| -> Result<Invocation> {
                    Ok(Invocation {
                        program: ctx.expand(&command.program)?,
                        args: ctx.expand_all(&command.args)?,
                        cwd: self.source_root.clone(),
                        env: env.vars().clone(),
                    })
                })
                .collect()
        };
        Ok(Pass {
            label: label.to_string(),
            build: expand(&self.recipe.build)?,
            test: expand(&self.recipe.test)?,
        })
    }

    fn apply_source_changes(&self, plan: &ResolvedPlan, prepared: &Prepared) -> Result<()> {
        for (file, pattern, replacement) in &prepared.substitutions {
            inreplace(&self.source_root, file, pattern, replacement)?;
        }
        for patch in &plan.patches {
            apply_patch(self.tool, &self.source_root, patch, &prepared.env)?;
        }
        for (path, content) in &prepared.files {
            let target = self.source_root.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!("Writing generated file {}", target.display());
            fs::write(&target, content)?;
        }
        Ok(())
    }

    fn build(&self, prepared: &Prepared, keg_path: &Path) -> Result<Vec<String>> {
        fs::create_dir_all(keg_path).map_err(|e| {
            KilnError::IoError(format!(
                "Failed to create keg directory {}: {}",
                keg_path.display(),
                e
            ))
        })?;
        let mut builds = Vec::new();
        for pass in &prepared.passes {
            info!("Building {} ({})", self.recipe.name, pass.label);
            for invocation in &pass.build {
                let output = self.tool.invoke(invocation)?;
                builds.push(invocation.command_line());
                if !output.success() {
                    return Err(KilnError::BuildFailure {
                        command: invocation.command_line(),
                        status: output.status_string(),
                        stdout: output.stdout,
                        stderr: output.stderr,
                    });
                }
            }
        }
        Ok(builds)
    }

    fn test(&self, prepared: &Prepared) -> Vec<KilnError> {
        let mut failures = Vec::new();
        for pass in &prepared.passes {
            info!("Testing {} ({})", self.recipe.name, pass.label);
            for invocation in &pass.test {
                let failure = match self.tool.invoke(invocation) {
                    Ok(output) if output.success() => continue,
                    Ok(output) => KilnError::TestFailure {
                        command: invocation.command_line(),
                        status: output.status_string(),
                        stderr: output.stderr,
                    },
                    Err(e) => KilnError::TestFailure {
                        command: invocation.command_line(),
                        status: "not started".to_string(),
                        stderr: e.to_string(),
                    },
                };
                warn!("{}", failure);
                failures.push(failure);
            }
        }
        failures
    }
}
