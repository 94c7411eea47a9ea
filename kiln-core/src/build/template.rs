// kiln-core/src/build/template.rs
//! `{placeholder}` expansion for recipe strings.
//!
//! Recognised: `{prefix}`, `{kiln_prefix}`, `{sdk_path}`, `{home}`,
//! `{python}` (only inside a variant pass) and `{opt:<name>}`. `{{` and `}}`
//! are literal braces. Anything else is an error.

use std::path::PathBuf;

use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use kiln_common::model::HostFacts;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{|\}\}|\{([a-z_]+)(?::([^{}\s]+))?\}").unwrap();
}

#[derive(Debug, Clone)]
pub struct TemplateContext {
    prefix: PathBuf,
    kiln_prefix: PathBuf,
    opt_dir: PathBuf,
    sdk_path: Option<PathBuf>,
    home: PathBuf,
    python: Option<String>,
}

impl TemplateContext {
    pub fn new(config: &Config, host: &HostFacts, keg_path: PathBuf) -> Self {
        Self {
            prefix: keg_path,
            kiln_prefix: host.kiln_prefix.clone(),
            opt_dir: config.opt_dir(),
            sdk_path: host.sdk_path.clone(),
            home: config.home_dir(),
            python: None,
        }
    }

    /// The same context with `{python}` bound to `program`.
    pub fn for_variant(&self, program: &str) -> Self {
        Self {
            python: Some(program.to_string()),
            ..self.clone()
        }
    }

    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    pub fn expand(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&input[last..whole.start()]);
            out.push_str(&self.lookup(&caps, input)?);
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }

    pub fn expand_all(&self, inputs: &[String]) -> Result<Vec<String>> {
        inputs.iter().map(|s| self.expand(s)).collect()
    }

    fn lookup(&self, caps: &Captures<'_>, input: &str) -> Result<String> {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        match whole {
            "{{" => return Ok("{".to_string()),
            "}}" => return Ok("}".to_string()),
            _ => {}
        }
        let name = caps.get(1).map_or("", |m| m.as_str());
        let arg = caps.get(2).map(|m| m.as_str());
        let display = |p: &PathBuf| p.to_string_lossy().into_owned();
        match (name, arg) {
            ("prefix", None) => Ok(display(&self.prefix)),
            ("kiln_prefix", None) => Ok(display(&self.kiln_prefix)),
            ("home", None) => Ok(display(&self.home)),
            ("sdk_path", None) => self.sdk_path.as_ref().map(display).ok_or_else(|| {
                KilnError::Template(format!("{{sdk_path}} used in '{input}' but no SDK was found"))
            }),
            ("python", None) => self.python.clone().ok_or_else(|| {
                KilnError::Template(format!(
                    "{{python}} used in '{input}' outside of a runtime variant"
                ))
            }),
            ("opt", Some(package)) => {
                let short = package.rsplit('/').next().unwrap_or(package);
                Ok(display(&self.opt_dir.join(short)))
            }
            _ => Err(KilnError::Template(format!(
                "Unknown placeholder '{whole}' in '{input}'"
            ))),
        }
    }
}
