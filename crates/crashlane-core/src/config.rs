// Grouping configuration
//
// GroupingConfig can be:
// - Created directly for tests and embedded use
// - Built from environment variables via `from_env`

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{IngestError, Result};

/// Default maximum Hamming distance for two fingerprints to count as the same issue
pub const DEFAULT_MAX_DISTANCE: u32 = 3;

/// Which groups an event is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingScope {
    /// All groups of the application, across versions
    #[default]
    App,
    /// Only groups created for the same app version
    AppVersion,
}

impl FromStr for GroupingScope {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(GroupingScope::App),
            "app_version" => Ok(GroupingScope::AppVersion),
            other => Err(IngestError::config(format!(
                "unknown grouping scope '{other}', expected 'app' or 'app_version'"
            ))),
        }
    }
}

/// Configuration for the bucketing engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Match when the Hamming distance is at most this many bits
    #[serde(default = "default_max_distance")]
    pub max_distance: u32,

    /// Group lookup scope
    #[serde(default)]
    pub scope: GroupingScope,

    /// Serialise match-or-create per (application, kind) inside this process
    #[serde(default = "default_serialize")]
    pub serialize: bool,
}

fn default_max_distance() -> u32 {
    DEFAULT_MAX_DISTANCE
}

fn default_serialize() -> bool {
    true
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            scope: GroupingScope::default(),
            serialize: default_serialize(),
        }
    }
}

impl GroupingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the similarity threshold
    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Set the lookup scope
    pub fn with_scope(mut self, scope: GroupingScope) -> Self {
        self.scope = scope;
        self
    }

    /// Enable or disable the in-process lock
    pub fn with_serialize(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    /// Load from `GROUPING_MAX_DISTANCE`, `GROUPING_SCOPE`, `GROUPING_SERIALIZE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GROUPING_MAX_DISTANCE") {
            config.max_distance = raw.trim().parse().map_err(|_| {
                IngestError::config(format!("GROUPING_MAX_DISTANCE must be an integer, got '{raw}'"))
            })?;
            if config.max_distance > 64 {
                return Err(IngestError::config(
                    "GROUPING_MAX_DISTANCE must be between 0 and 64",
                ));
            }
        }

        if let Some(raw) = lookup("GROUPING_SCOPE") {
            config.scope = raw.parse()?;
        }

        if let Some(raw) = lookup("GROUPING_SERIALIZE") {
            config.serialize = !matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "false" | "0" | "no" | "off"
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GroupingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_distance, 3);
        assert_eq!(config.scope, GroupingScope::App);
        assert!(config.serialize);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = GroupingConfig::from_lookup(lookup(&[
            ("GROUPING_MAX_DISTANCE", "5"),
            ("GROUPING_SCOPE", "app_version"),
            ("GROUPING_SERIALIZE", "false"),
        ]))
        .unwrap();
        assert_eq!(config.max_distance, 5);
        assert_eq!(config.scope, GroupingScope::AppVersion);
        assert!(!config.serialize);
    }

    #[test]
    fn test_invalid_values() {
        assert!(GroupingConfig::from_lookup(lookup(&[("GROUPING_MAX_DISTANCE", "x")])).is_err());
        assert!(GroupingConfig::from_lookup(lookup(&[("GROUPING_MAX_DISTANCE", "65")])).is_err());
        assert!(GroupingConfig::from_lookup(lookup(&[("GROUPING_SCOPE", "team")])).is_err());
    }

    #[test]
    fn test_builder() {
        let config = GroupingConfig::new()
            .with_max_distance(0)
            .with_scope(GroupingScope::AppVersion)
            .with_serialize(false);
        assert_eq!(config.max_distance, 0);
        assert_eq!(config.scope, GroupingScope::AppVersion);
        assert!(!config.serialize);
    }
}
