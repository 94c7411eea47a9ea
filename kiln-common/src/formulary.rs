use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::config::Config;
use super::error::{KilnError, Result};
use super::model::recipe::Recipe;

const BUILTIN_RECIPES: &[(&str, &str)] = &[
    ("matplotlib", include_str!("../recipes/matplotlib.json")),
    ("numpy", include_str!("../recipes/numpy.json")),
];

/// Looks recipes up by name: `KILN_RECIPE_PATH` directories first, then
/// `<prefix>/Library/Recipes`, then the recipes compiled into the binary.
pub struct Formulary {
    search_dirs: Vec<PathBuf>,
    parsed_cache: Mutex<HashMap<String, Arc<Recipe>>>,
}

impl Formulary {
    pub fn new(config: &Config) -> Self {
        let mut search_dirs = config.recipe_paths.clone();
        search_dirs.push(config.recipes_dir());
        Self {
            search_dirs,
            parsed_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>> {
        if let Some(recipe) = self.cache_guard()?.get(name) {
            debug!("Loaded recipe '{}' from parsed cache.", name);
            return Ok(Arc::clone(recipe));
        }

        let recipe = Arc::new(self.find_and_parse(name)?);
        debug!(
            "Successfully loaded recipe '{}' version {}",
            recipe.name, recipe.version
        );
        self.cache_guard()?
            .insert(name.to_string(), Arc::clone(&recipe));
        Ok(recipe)
    }

    /// Every recipe name this formulary can load, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = BUILTIN_RECIPES
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        for dir in &self.search_dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem() {
                        names.insert(stem.to_string_lossy().to_string());
                    }
                }
            }
        }
        names.into_iter().collect()
    }

    fn find_and_parse(&self, name: &str) -> Result<Recipe> {
        for dir in &self.search_dirs {
            let candidate = dir.join(format!("{name}.json"));
            if candidate.is_file() {
                debug!("Found recipe '{}' at {}", name, candidate.display());
                return Recipe::from_path(&candidate);
            }
        }
        BUILTIN_RECIPES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, raw)| {
                debug!("Using built-in recipe '{}'", name);
                Recipe::from_json_str(raw)
            })
            .unwrap_or_else(|| Err(KilnError::NotFound(format!("Recipe '{name}' not found."))))
    }

    fn cache_guard(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Recipe>>>> {
        self.parsed_cache
            .lock()
            .map_err(|_| KilnError::Generic("Recipe cache lock poisoned".to_string()))
    }
}
