// kiln-core/src/check/requirements.rs
//! Evaluates requirement probes against the host.

use std::path::PathBuf;

use kiln_common::dependency::{Probe, Requirement, RequirementOutcome};
use kiln_common::error::Result;
use tracing::{debug, warn};

use super::probe::HostProbe;

/// Runs `requirement`'s probe. Probe breakage (spawn failure, unreadable
/// path) counts as "not satisfied" and is logged, never returned.
pub fn check_requirement(requirement: &Requirement, probe: &dyn HostProbe) -> RequirementOutcome {
    let satisfied = match evaluate(&requirement.probe, requirement.user_paths, probe) {
        Ok(satisfied) => satisfied,
        Err(e) => {
            warn!(
                "Probe for requirement '{}' failed, treating as unsatisfied: {}",
                requirement.name, e
            );
            false
        }
    };
    debug!(
        "Requirement '{}' ({}) satisfied: {}",
        requirement.name, requirement.probe, satisfied
    );
    requirement.outcome(satisfied)
}

fn evaluate(spec: &Probe, user_paths: bool, probe: &dyn HostProbe) -> Result<bool> {
    match spec {
        Probe::AnyExecutable(names) => {
            for name in names {
                if probe.find_executable(name, user_paths)?.is_some() {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Probe::AllCommandsSucceed(commands) => {
            for command in commands {
                let Some((program, args)) = command.split_first() else {
                    continue;
                };
                if !probe.command_succeeds(program, args, user_paths)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Probe::PathAbsent(raw) => Ok(!probe.path_exists(&expand_home(raw, probe))?),
        Probe::PathPresent(raw) => probe.path_exists(&expand_home(raw, probe)),
        Probe::All(probes) => {
            for inner in probes {
                if !evaluate(inner, user_paths, probe)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Probe::Any(probes) => {
            for inner in probes {
                if evaluate(inner, user_paths, probe)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn expand_home(raw: &str, probe: &dyn HostProbe) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => probe.home_dir().join(rest),
        None if raw == "~" => probe.home_dir(),
        None => PathBuf::from(raw),
    }
}

/// Outcome of checking a plan's requirements in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementReport {
    /// Every requirement that was actually probed, in order.
    pub checked: Vec<(String, RequirementOutcome)>,
    /// Requirements skipped because an earlier fatal one already failed.
    pub skipped: Vec<String>,
    /// The first fatal failure: (name, message).
    pub fatal: Option<(String, String)>,
    pub advisories: Vec<String>,
}

impl RequirementReport {
    pub fn is_satisfied(&self) -> bool {
        self.fatal.is_none()
    }
}

/// Checks every requirement. The first fatal failure is kept as the abort
/// reason; later fatal requirements are skipped but advisory ones still run
/// so all advisories are collected.
pub fn check_all(requirements: &[Requirement], probe: &dyn HostProbe) -> RequirementReport {
    let mut report = RequirementReport::default();
    for requirement in requirements {
        if requirement.is_fatal() && report.fatal.is_some() {
            debug!(
                "Skipping fatal requirement '{}': run already aborting",
                requirement.name
            );
            report.skipped.push(requirement.name.clone());
            continue;
        }
        let outcome = check_requirement(requirement, probe);
        match &outcome {
            RequirementOutcome::Satisfied => {}
            RequirementOutcome::Fatal(message) => {
                report.fatal = Some((requirement.name.clone(), message.clone()));
            }
            RequirementOutcome::Advisory(message) => report.advisories.push(message.clone()),
        }
        report.checked.push((requirement.name.clone(), outcome));
    }
    report
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::path::Path;

    use kiln_common::error::KilnError;

    use super::*;

    #[derive(Default)]
    struct FakeProbe {
        executables: HashSet<String>,
        user_executables: HashSet<String>,
        paths: HashSet<PathBuf>,
        broken: bool,
        lookups: RefCell<Vec<String>>,
    }

    impl HostProbe for FakeProbe {
        fn find_executable(&self, name: &str, user_paths: bool) -> Result<Option<PathBuf>> {
            self.lookups.borrow_mut().push(name.to_string());
            if self.broken {
                return Err(KilnError::ProbeError("boom".into()));
            }
            let found = self.executables.contains(name)
                || (user_paths && self.user_executables.contains(name));
            Ok(found.then(|| PathBuf::from("/usr/bin").join(name)))
        }

        fn command_succeeds(&self, program: &str, _args: &[String], user_paths: bool) -> Result<bool> {
            Ok(self.find_executable(program, user_paths)?.is_some())
        }

        fn path_exists(&self, path: &Path) -> Result<bool> {
            Ok(self.paths.contains(path))
        }

        fn home_dir(&self) -> PathBuf {
            PathBuf::from("/Users/tester")
        }
    }

    fn gfortran() -> Requirement {
        Requirement::new(
            "GfortranAvailable",
            true,
            "No gfortran found!",
            Probe::AnyExecutable(vec!["gfortran".into(), "gfortran-4.7".into()]),
        )
    }

    fn no_user_config() -> Requirement {
        Requirement::new(
            "NoUserConfig",
            false,
            "A ~/.numpy-site.cfg was found.",
            Probe::PathAbsent("~/.numpy-site.cfg".into()),
        )
    }

    #[test]
    fn any_executable_accepts_alternatives() {
        let mut probe = FakeProbe::default();
        probe.executables.insert("gfortran-4.7".into());
        assert!(check_requirement(&gfortran(), &probe).is_satisfied());
    }

    #[test]
    fn home_is_expanded() {
        let mut probe = FakeProbe::default();
        assert!(check_requirement(&no_user_config(), &probe).is_satisfied());
        probe
            .paths
            .insert(PathBuf::from("/Users/tester/.numpy-site.cfg"));
        assert_eq!(
            check_requirement(&no_user_config(), &probe),
            RequirementOutcome::Advisory("A ~/.numpy-site.cfg was found.".into())
        );
    }

    #[test]
    fn user_paths_switch_search_path() {
        let mut probe = FakeProbe::default();
        probe.user_executables.insert("latex".into());
        probe.user_executables.insert("dvipng".into());
        let mut tex = Requirement::new(
            "TexRequirement",
            false,
            "LaTeX not found.",
            Probe::AllCommandsSucceed(vec![
                vec!["latex".into(), "-version".into()],
                vec!["dvipng".into(), "-version".into()],
            ]),
        );
        assert!(!check_requirement(&tex, &probe).is_satisfied());
        tex.user_paths = true;
        assert!(check_requirement(&tex, &probe).is_satisfied());
    }

    #[test]
    fn broken_probe_is_unsatisfied_not_error() {
        let probe = FakeProbe {
            broken: true,
            ..Default::default()
        };
        assert!(check_requirement(&gfortran(), &probe).is_fatal());
    }

    #[test]
    fn first_fatal_wins_and_advisories_still_run() {
        let mut probe = FakeProbe::default();
        probe
            .paths
            .insert(PathBuf::from("/Users/tester/.numpy-site.cfg"));
        let second_fatal = Requirement::new(
            "Freetype",
            true,
            "freetype is missing",
            Probe::AnyExecutable(vec!["freetype-config".into()]),
        );
        let report = check_all(&[gfortran(), second_fatal, no_user_config()], &probe);
        assert_eq!(
            report.fatal,
            Some(("GfortranAvailable".into(), "No gfortran found!".into()))
        );
        assert_eq!(report.skipped, vec!["Freetype".to_string()]);
        assert_eq!(report.advisories, vec!["A ~/.numpy-site.cfg was found.".to_string()]);
        assert!(!probe.lookups.borrow().contains(&"freetype-config".to_string()));
    }

    #[test]
    fn nested_probes_combine() {
        let mut probe = FakeProbe::default();
        probe.executables.insert("gfortran".into());
        let combined = Probe::All(vec![
            Probe::AnyExecutable(vec!["gfortran".into()]),
            Probe::Any(vec![
                Probe::PathPresent("/nope".into()),
                Probe::PathAbsent("/also-nope".into()),
            ]),
        ]);
        assert!(evaluate(&combined, false, &probe).unwrap());
    }
}
