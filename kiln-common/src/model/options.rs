// kiln-common/src/model/options.rs
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The flags selected by the invoking user, e.g. `with-openblas`.
///
/// Taken once per invocation and never mutated afterwards. Leading dashes are
/// stripped on construction so `--with-openblas` and `with-openblas` are the
/// same flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildOptionSet(BTreeSet<String>);

impl BuildOptionSet {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            flags
                .into_iter()
                .map(|f| f.as_ref().trim().trim_start_matches('-').to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        )
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag.trim_start_matches('-'))
    }

    /// `without-<name>` was passed.
    pub fn without(&self, name: &str) -> bool {
        self.contains(&format!("without-{name}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for BuildOptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for BuildOptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(", "))
    }
}

/// An option a recipe declares, shown by `kiln info`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Gates a substitution, generated-file section, patch or env setting on the option set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionGate {
    #[default]
    Always,
    IfOption(String),
    UnlessOption(String),
}

impl OptionGate {
    pub fn is_open(&self, options: &BuildOptionSet) -> bool {
        match self {
            Self::Always => true,
            Self::IfOption(flag) => options.contains(flag),
            Self::UnlessOption(flag) => !options.contains(flag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashes_are_normalized() {
        let options = BuildOptionSet::new(["--with-openblas", "  with-python3 ", ""]);
        assert_eq!(options.iter().count(), 2);
        assert!(options.contains("with-openblas"));
        assert!(options.contains("--with-python3"));
        assert!(!options.without("python"));
    }

    #[test]
    fn gates_follow_flags() {
        let options = BuildOptionSet::new(["with-openblas"]);
        assert!(OptionGate::Always.is_open(&options));
        assert!(OptionGate::IfOption("with-openblas".into()).is_open(&options));
        assert!(!OptionGate::UnlessOption("with-openblas".into()).is_open(&options));
        assert!(OptionGate::UnlessOption("without-python".into()).is_open(&options));
    }

    #[test]
    fn display_is_sorted() {
        let options = BuildOptionSet::new(["with-b", "with-a"]);
        assert_eq!(options.to_string(), "with-a, with-b");
        assert_eq!(BuildOptionSet::empty().to_string(), "(none)");
    }
}
