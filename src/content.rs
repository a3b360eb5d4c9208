//! Content repository
//!
//! Loads and indexes the named content pools: the genome (archetypes), the
//! koan database, and every framework JSON under `frameworks/`. Pool schemas
//! are externally authored and only partially consumed, so items are kept as
//! generic key-value records instead of fixed structs.
//!
//! Missing files or keys are never errors here: an absent pool selects as
//! the empty item and callers degrade to default strings.

use crate::{BridgeError, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Genome file and the key its archetype list lives under.
const GENOME_FILE: &str = "gaia_genome.json";
const ARCHETYPES_KEY: &str = "consciousness_layers";

/// Koan file and its database key.
const KOANS_FILE: &str = "koans.json";
const KOANS_KEY: &str = "ghs_koan_database";

/// Framework whose `cases` list feeds the cooperative mode.
const COOPERATIVE_FRAMEWORK: &str = "cooperative_synapse";
const COOPERATIVE_CASES_KEY: &str = "cases";

/// A single content record with an externally defined schema.
///
/// Readers pull out the keys they expect (`text`, `category`, `mission`, ...)
/// with a default for anything absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentItem(serde_json::Map<String, Value>);

impl ContentItem {
    /// The "no content available" item.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from an arbitrary JSON value; non-objects collapse to empty.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            _ => Self::empty(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, if present and actually a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String field with a documented default for absence.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str_field(key).unwrap_or(default)
    }
}

/// Repository of loaded content pools with uniform-random selection.
///
/// Selection deliberately allows repeats: mastery counts exposure frequency,
/// not distinct coverage. The RNG is owned and seedable so tests can pin
/// selection outcomes.
pub struct ContentRepository {
    base_path: PathBuf,
    archetypes: Vec<ContentItem>,
    koans: Vec<ContentItem>,
    frameworks: HashMap<String, Value>,
    cooperative_cases: Vec<ContentItem>,
    rng: StdRng,
}

impl ContentRepository {
    /// Load every pool under `base_path`. Missing files yield empty pools.
    pub async fn load(base_path: &Path, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut repo = Self {
            base_path: base_path.to_path_buf(),
            archetypes: Vec::new(),
            koans: Vec::new(),
            frameworks: HashMap::new(),
            cooperative_cases: Vec::new(),
            rng,
        };
        repo.load_all().await;
        repo
    }

    /// Re-run the full load sequence, replacing in-memory state.
    pub async fn reload(&mut self) {
        info!("Reloading all content from {}", self.base_path.display());
        self.load_all().await;
    }

    async fn load_all(&mut self) {
        let genome = self.load_json(&self.base_path.join(GENOME_FILE)).await;
        let koans = self.load_json(&self.base_path.join(KOANS_FILE)).await;

        self.archetypes = items_under(&genome, ARCHETYPES_KEY);
        self.koans = items_under(&koans, KOANS_KEY);

        self.frameworks.clear();
        let frameworks_dir = self.base_path.join("frameworks");
        if frameworks_dir.is_dir() {
            self.load_frameworks_from_dir(&frameworks_dir).await;
        }
        self.refresh_cooperative_cases();

        info!(
            "Loaded: {} archetypes, {} koans, {} frameworks, {} cooperation cases",
            self.archetypes.len(),
            self.koans.len(),
            self.frameworks.len(),
            self.cooperative_cases.len()
        );
    }

    /// Load a specific framework JSON, or every JSON within a directory.
    /// Relative paths are also tried against `frameworks/`, with a `.json`
    /// suffix fallback. Returns the number of frameworks loaded.
    pub async fn load_framework(&mut self, path_str: &str) -> Result<usize> {
        let mut path = PathBuf::from(path_str);
        if !path.is_absolute() && !path.exists() {
            let candidate = self.base_path.join("frameworks").join(path_str);
            if candidate.exists() {
                path = candidate;
            } else if candidate.with_extension("json").exists() {
                path = candidate.with_extension("json");
            }
        }

        if !path.exists() {
            return Err(BridgeError::InvalidPath(PathBuf::from(path_str)));
        }

        if path.is_dir() {
            let count = self.load_frameworks_from_dir(&path).await;
            self.refresh_cooperative_cases();
            info!("Loaded {} frameworks from directory {}", count, path.display());
            return Ok(count);
        }

        let content = fs::read_to_string(&path).await?;
        let value: Value = serde_json::from_str(&content)?;
        let stem = file_stem(&path);
        self.frameworks.insert(stem.clone(), value);
        if stem == COOPERATIVE_FRAMEWORK {
            self.refresh_cooperative_cases();
        }
        info!("Framework loaded: {}", stem);
        Ok(1)
    }

    /// One pool per `*.json` file, keyed by file stem. Unparsable files are
    /// skipped with a warning so a bad pool cannot take down the load.
    async fn load_frameworks_from_dir(&mut self, dir: &Path) -> usize {
        let pattern = format!("{}/*.json", dir.display());
        let entries: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
            Err(e) => {
                warn!("Bad frameworks glob {}: {}", pattern, e);
                return 0;
            }
        };

        let mut count = 0;
        for file in entries {
            let value = self.load_json(&file).await;
            if value.is_null() {
                continue;
            }
            self.frameworks.insert(file_stem(&file), value);
            count += 1;
        }
        count
    }

    /// Read a JSON file; absence or a parse failure yields `Null`.
    async fn load_json(&self, path: &Path) -> Value {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(_) => {
                debug!("Content file absent: {}", path.display());
                return Value::Null;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not parse {}: {}", path.display(), e);
                Value::Null
            }
        }
    }

    fn refresh_cooperative_cases(&mut self) {
        self.cooperative_cases = self
            .frameworks
            .get(COOPERATIVE_FRAMEWORK)
            .map(|v| items_under(v, COOPERATIVE_CASES_KEY))
            .unwrap_or_default();
    }

    // ── Random selectors ────────────────────────────────────────────

    pub fn random_koan(&mut self) -> ContentItem {
        Self::pick(&self.koans, &mut self.rng)
    }

    pub fn random_archetype(&mut self) -> ContentItem {
        Self::pick(&self.archetypes, &mut self.rng)
    }

    pub fn random_cooperation_case(&mut self) -> ContentItem {
        Self::pick(&self.cooperative_cases, &mut self.rng)
    }

    /// Random element from a framework's named list, empty when the
    /// framework or the key is missing.
    pub fn framework_element(&mut self, framework: &str, key: &str) -> ContentItem {
        let items = self
            .frameworks
            .get(framework)
            .map(|v| items_under(v, key))
            .unwrap_or_default();
        Self::pick(&items, &mut self.rng)
    }

    fn pick(items: &[ContentItem], rng: &mut StdRng) -> ContentItem {
        items.choose(rng).cloned().unwrap_or_else(ContentItem::empty)
    }

    /// Random `(key, value)` pair from a string map nested under `keys`
    /// inside a framework. Used for the engineer forge's teaching sub-modes.
    pub fn random_framework_entry(
        &mut self,
        framework: &str,
        keys: &[&str],
    ) -> Option<(String, String)> {
        let mut node = self.frameworks.get(framework)?;
        for key in keys {
            node = node.get(key)?;
        }
        let map = node.as_object()?;
        let names: Vec<&String> = map.keys().collect();
        let name = names.choose(&mut self.rng)?;
        let value = map.get(*name)?.as_str().unwrap_or_default();
        Some((name.to_string(), value.to_string()))
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Raw framework value, for readers that need more than one element.
    pub fn framework(&self, name: &str) -> Option<&Value> {
        self.frameworks.get(name)
    }

    /// Ordered names of all known archetypes.
    pub fn archetype_names(&self) -> Vec<String> {
        self.archetypes
            .iter()
            .filter_map(|a| a.str_field("archetype").map(str::to_string))
            .collect()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn koan_count(&self) -> usize {
        self.koans.len()
    }

    pub fn framework_count(&self) -> usize {
        self.frameworks.len()
    }
}

/// Extract the object list under `key`, tolerating any shape mismatch.
fn items_under(value: &Value, key: &str) -> Vec<ContentItem> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(ContentItem::from_value).collect())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}
