//! Priority-chain setting lookup.
//!
//! A [`ConfigResolver`] answers `resolve("DB_BOX_HOST")` by trying its
//! sources in priority order, first non-absent value wins:
//!
//! | Priority | Source | Keyed by |
//! |----------|--------|----------|
//! | 1 | explicit mapping given at construction | prefix-stripped lowercase key (`host`) |
//! | 2 | local override table | full name (`DB_BOX_HOST`) |
//! | 3 | global process environment | full name |
//! | 4 | environment snapshot (captured vars, `.env` file) | full name |
//!
//! Sources are injected, so a resolver built without
//! [`ConfigSource::process_env`] never reads global state.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Lookup function over a live environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// One place a setting can come from.
#[derive(Clone)]
pub enum ConfigSource {
    /// Explicit configuration mapping, keyed by config key.
    Explicit(HashMap<String, String>),
    /// Local-process environment override, keyed by full name.
    Overrides(HashMap<String, String>),
    /// Global process environment, keyed by full name.
    Global(EnvLookup),
    /// Environment snapshot/table, keyed by full name.
    Snapshot(HashMap<String, String>),
}

impl ConfigSource {
    /// The real process environment.
    pub fn process_env() -> Self {
        ConfigSource::Global(Arc::new(|name| std::env::var(name).ok()))
    }

    /// Snapshot of the process environment as it is now.
    pub fn snapshot_of_process() -> Self {
        ConfigSource::Snapshot(std::env::vars().collect())
    }

    /// Snapshot read from a dotenv file. Nothing is exported to the process.
    pub fn snapshot_from_env_file(path: impl AsRef<Path>) -> Result<Self, dotenvy::Error> {
        let table = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(ConfigSource::Snapshot(table))
    }

    fn priority(&self) -> u8 {
        match self {
            ConfigSource::Explicit(_) => 0,
            ConfigSource::Overrides(_) => 1,
            ConfigSource::Global(_) => 2,
            ConfigSource::Snapshot(_) => 3,
        }
    }

    fn lookup(&self, name: &str, key: &str) -> Option<String> {
        match self {
            ConfigSource::Explicit(map) => map.get(key).cloned(),
            ConfigSource::Overrides(map) | ConfigSource::Snapshot(map) => map.get(name).cloned(),
            ConfigSource::Global(lookup) => lookup(name),
        }
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(map) => f.debug_tuple("Explicit").field(&map.len()).finish(),
            ConfigSource::Overrides(map) => f.debug_tuple("Overrides").field(&map.len()).finish(),
            ConfigSource::Global(_) => f.write_str("Global"),
            ConfigSource::Snapshot(map) => f.debug_tuple("Snapshot").field(&map.len()).finish(),
        }
    }
}

/// Resolves prefixed settings across an ordered list of sources.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    prefix: String,
    sources: Vec<ConfigSource>,
}

impl ConfigResolver {
    /// Creates a resolver with no sources; every lookup is `None`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sources: Vec::new(),
        }
    }

    /// Resolver over the live process environment plus a snapshot of it.
    pub fn from_process(prefix: impl Into<String>) -> Self {
        Self::new(prefix)
            .with_source(ConfigSource::process_env())
            .with_source(ConfigSource::snapshot_of_process())
    }

    /// Adds a source. Sources are kept in priority order regardless of the
    /// order they are added in.
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self.sources.sort_by_key(ConfigSource::priority);
        self
    }

    pub fn with_explicit<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_source(ConfigSource::Explicit(collect(entries)))
    }

    pub fn with_overrides<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_source(ConfigSource::Overrides(collect(entries)))
    }

    pub fn with_snapshot<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_source(ConfigSource::Snapshot(collect(entries)))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Config-mapping key for a setting name: `DB_BOX_HOST` -> `host`.
    pub fn config_key(&self, name: &str) -> String {
        name.strip_prefix(self.prefix.as_str())
            .unwrap_or(name)
            .to_lowercase()
    }

    /// Full setting name for a config key: `host` -> `DB_BOX_HOST`.
    pub fn setting_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase())
    }

    /// Looks a setting up by full name.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let key = self.config_key(name);
        self.sources
            .iter()
            .find_map(|source| source.lookup(name, &key))
    }

    /// Looks a setting up by config key.
    pub fn resolve_key(&self, key: &str) -> Option<String> {
        self.resolve(&self.setting_name(key))
    }

    /// Names from `names` that resolve to nothing, each once, in input order.
    pub fn missing<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            if self.resolve(name).is_none() && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        missing
    }
}

fn collect<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> HashMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
