use serde::Deserialize;

/// Entry count at which a per-key result cache stops growing. Inferred
/// from observed production behavior; empirical, not load-tested, hence
/// configurable.
pub const DEFAULT_CACHE_COLLAPSE_THRESHOLD: usize = 30;

/// Engine-wide tunables shared by every slice of a store.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Once a per-key result cache holds this many entries, the next write
    /// for a new key replaces the whole map with that single entry.
    pub cache_collapse_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_collapse_threshold: DEFAULT_CACHE_COLLAPSE_THRESHOLD,
        }
    }
}
