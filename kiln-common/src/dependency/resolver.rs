// kiln-common/src/dependency/resolver.rs
//! Turns a recipe plus one invocation's options and host facts into the
//! concrete set of things to check, patch and build.

use std::collections::HashMap;

use tracing::debug;

use super::definition::{DependencySpec, DependencyTarget, RuntimeSpec};
use super::requirement::Requirement;
use crate::model::host::HostFacts;
use crate::model::options::BuildOptionSet;
use crate::model::recipe::{EnvSetting, PatchSpec, Recipe, Substitution};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    /// Enabled specs in declaration order.
    pub dependencies: Vec<DependencySpec>,
    /// Requirements to check, in declaration order. Selected runtimes
    /// contribute a fatal "interpreter on PATH" requirement.
    pub requirements: Vec<Requirement>,
    /// Runtimes to build against, in declaration order.
    pub variants: Vec<RuntimeSpec>,
    pub substitutions: Vec<Substitution>,
    pub patches: Vec<PatchSpec>,
    /// (relative path, assembled content)
    pub files: Vec<(String, String)>,
    pub env: Vec<EnvSetting>,
}

impl ResolvedPlan {
    /// Names of external packages in the plan.
    pub fn packages(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter_map(|spec| match &spec.target {
                DependencyTarget::Package(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Packages enabled by more than one spec. Reported, never merged.
    pub fn duplicate_targets(&self) -> Vec<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for name in self.packages() {
            let count = counts.entry(name).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }
        order.into_iter().filter(|name| counts[name] > 1).collect()
    }
}

/// Evaluates every spec of `recipe` against `options` and `host`.
///
/// A spec is included when its option gate is open and, if present, its
/// platform condition holds. The platform condition is not consulted for
/// specs whose gate is closed. Pure function of its inputs.
pub fn resolve(recipe: &Recipe, options: &BuildOptionSet, host: &HostFacts) -> ResolvedPlan {
    debug!(
        "Resolving plan for '{}' with options [{}]",
        recipe.name, options
    );

    let mut dependencies = Vec::new();
    let mut requirements = Vec::new();
    let mut variants = Vec::new();

    for spec in &recipe.dependencies {
        if !spec.enabled_when(options) {
            debug!("Skipping '{}' ({}): gate closed", spec.name(), spec.kind);
            continue;
        }
        if !spec.platform_holds(host) {
            debug!(
                "Skipping '{}' ({}): platform condition {:?} does not hold",
                spec.name(),
                spec.kind,
                spec.platform
            );
            continue;
        }

        match &spec.target {
            DependencyTarget::Requirement(req) => requirements.push(req.clone()),
            DependencyTarget::Runtime(runtime) => {
                requirements.push(runtime.requirement());
                variants.push(runtime.clone());
            }
            DependencyTarget::Package(_) => {}
        }
        dependencies.push(spec.clone());
    }

    let substitutions = recipe
        .substitutions
        .iter()
        .filter(|s| s.when.is_open(options))
        .filter(|s| s.platform.as_ref().is_none_or(|c| c.holds(host)))
        .cloned()
        .collect();

    let patches = recipe
        .patches
        .iter()
        .filter(|p| p.when.is_open(options))
        .cloned()
        .collect();

    let files = recipe
        .files
        .iter()
        .map(|file| {
            let content: String = file
                .sections
                .iter()
                .filter(|section| section.when.is_open(options))
                .map(|section| section.content.as_str())
                .collect();
            (file.path.clone(), content)
        })
        .collect();

    let env = recipe
        .env
        .iter()
        .filter(|e| e.when.is_open(options))
        .cloned()
        .collect();

    let plan = ResolvedPlan {
        dependencies,
        requirements,
        variants,
        substitutions,
        patches,
        files,
        env,
    };
    debug!(
        "Resolved {} dependencies, {} requirements, variants {:?}",
        plan.dependencies.len(),
        plan.requirements.len(),
        plan.variants.iter().map(|v| &v.name).collect::<Vec<_>>()
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::definition::DependencyKind;
    use crate::dependency::requirement::Probe;
    use crate::model::host::PlatformCondition;
    use crate::model::options::OptionGate;
    use crate::model::recipe::{CommandTemplate, FileSection, GeneratedFile};

    fn recipe_with(dependencies: Vec<DependencySpec>) -> Recipe {
        Recipe {
            name: "demo".into(),
            version: "1.0".into(),
            homepage: None,
            url: "https://example.com/demo.tar.gz".into(),
            checksum: String::new(),
            head: None,
            options: Vec::new(),
            exclusive_options: Vec::new(),
            dependencies,
            substitutions: Vec::new(),
            patches: Vec::new(),
            files: Vec::new(),
            env: Vec::new(),
            build: vec![CommandTemplate::new("make", ["install"])],
            test: Vec::new(),
            caveats: None,
        }
    }

    fn host() -> HostFacts {
        HostFacts::new("/opt/kiln")
    }

    #[test]
    fn optional_spec_follows_its_flag() {
        let recipe = recipe_with(vec![DependencySpec::package(
            "homebrew/science/openblas",
            DependencyKind::Optional("with-openblas".into()),
        )]);

        let plan = resolve(&recipe, &BuildOptionSet::empty(), &host());
        assert!(plan.packages().is_empty());

        let plan = resolve(&recipe, &BuildOptionSet::new(["with-openblas"]), &host());
        assert_eq!(plan.packages(), vec!["homebrew/science/openblas"]);
    }

    #[test]
    fn mutually_exclusive_backends_are_both_kept() {
        let recipe = recipe_with(vec![
            DependencySpec::package("blas", DependencyKind::Optional("with-openblas".into())),
            DependencySpec::package("blas", DependencyKind::Optional("with-atlas".into())),
        ]);
        let options = BuildOptionSet::new(["with-openblas", "with-atlas"]);
        let plan = resolve(&recipe, &options, &host());
        assert_eq!(plan.dependencies.len(), 2);
        assert_eq!(plan.duplicate_targets(), vec!["blas"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let recipe = recipe_with(vec![
            DependencySpec::runtime(
                RuntimeSpec::new("python", "python"),
                DependencyKind::Recommended,
            ),
            DependencySpec::runtime(
                RuntimeSpec::new("python3", "python3"),
                DependencyKind::Optional("with-python3".into()),
            ),
            DependencySpec::requirement(
                Requirement::new("Tex", false, "no tex", Probe::AnyExecutable(vec![])),
                DependencyKind::Required,
            ),
        ]);
        let options = BuildOptionSet::new(["with-python3"]);
        let first = resolve(&recipe, &options, &host());
        let second = resolve(&recipe, &options, &host());
        assert_eq!(first, second);
        assert_eq!(
            first.variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            vec!["python", "python3"]
        );
        let names: Vec<&str> = first.requirements.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["python", "python3", "Tex"]);
    }

    #[test]
    fn without_flag_drops_recommended_runtime() {
        let recipe = recipe_with(vec![DependencySpec::runtime(
            RuntimeSpec::new("python", "python"),
            DependencyKind::Recommended,
        )]);
        let plan = resolve(&recipe, &BuildOptionSet::new(["without-python"]), &host());
        assert!(plan.variants.is_empty());
        assert!(plan.requirements.is_empty());
    }

    #[test]
    fn platform_gated_substitution() {
        let mut recipe = recipe_with(Vec::new());
        recipe.substitutions = vec![Substitution {
            file: "setupext.py".into(),
            pattern: "'/System/Library/Frameworks/',".into(),
            replacement: "'{sdk_path}/System/Library/Frameworks',".into(),
            when: OptionGate::Always,
            platform: Some(PlatformCondition::CltMissing),
        }];
        let mut facts = host();
        facts.os = "macos".into();
        facts.clt_installed = true;
        assert!(resolve(&recipe, &BuildOptionSet::empty(), &facts)
            .substitutions
            .is_empty());
        facts.clt_installed = false;
        assert_eq!(
            resolve(&recipe, &BuildOptionSet::empty(), &facts)
                .substitutions
                .len(),
            1
        );
        facts.os = "linux".into();
        assert!(resolve(&recipe, &BuildOptionSet::empty(), &facts)
            .substitutions
            .is_empty());
    }

    #[test]
    fn generated_file_sections_follow_options() {
        let mut recipe = recipe_with(Vec::new());
        recipe.files = vec![GeneratedFile {
            path: "site.cfg".into(),
            sections: vec![
                FileSection {
                    when: OptionGate::Always,
                    content: "[DEFAULT]\n".into(),
                },
                FileSection {
                    when: OptionGate::IfOption("with-openblas".into()),
                    content: "[blas_opt]\n".into(),
                },
            ],
        }];
        let plan = resolve(&recipe, &BuildOptionSet::empty(), &host());
        assert_eq!(plan.files, vec![("site.cfg".to_string(), "[DEFAULT]\n".to_string())]);
        let plan = resolve(&recipe, &BuildOptionSet::new(["with-openblas"]), &host());
        assert_eq!(plan.files[0].1, "[DEFAULT]\n[blas_opt]\n");
    }
}
