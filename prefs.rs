/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine configuration, read from TOML.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::ViewMode;
use crate::error::{EngineError, EngineResult};
use crate::registries::DEFAULT_TOPOLOGY;
use crate::route::RouteDefaults;

pub const DEFAULT_INGRESS_CAPACITY: usize = 256;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Topology registered and active at startup.
    pub default_topology: String,
    pub default_view_mode: ViewMode,
    /// Capacity of the runtime mailbox.
    pub ingress_capacity: usize,
    /// `EnvFilter` directive for the binary's subscriber.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_topology: DEFAULT_TOPOLOGY.to_string(),
            default_view_mode: ViewMode::Graph,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            EngineError::Io(format!("reading {}: {error}", path.display()))
        })?;
        raw.parse()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.default_topology.trim().is_empty() {
            return Err(EngineError::Config(
                "default_topology must not be empty".to_string(),
            ));
        }
        if self.ingress_capacity == 0 {
            return Err(EngineError::Config(
                "ingress_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn route_defaults(&self) -> RouteDefaults {
        RouteDefaults {
            topology: self.default_topology.clone(),
            view_mode: self.default_view_mode,
        }
    }
}

impl FromStr for EngineConfig {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_takes_defaults() {
        let config: EngineConfig = "".parse().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.route_defaults(), RouteDefaults::default());
    }

    #[test]
    fn partial_document_overrides_named_keys() {
        let config: EngineConfig = r#"
            default_topology = "hosts"
            default_view_mode = "table"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.default_topology, "hosts");
        assert_eq!(config.default_view_mode, ViewMode::Table);
        assert_eq!(config.ingress_capacity, DEFAULT_INGRESS_CAPACITY);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for raw in [
            "ingress_capacity = 0",
            "default_topology = \"  \"",
            "default_view_mode = \"cube\"",
            "unknown_key = 1",
            "default_topology = [",
        ] {
            let result = raw.parse::<EngineConfig>();
            assert!(
                matches!(result, Err(EngineError::Config(_))),
                "{raw:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ingress_capacity = 8").unwrap();
        writeln!(file, "log_filter = \"topoview=debug\"").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.ingress_capacity, 8);
        assert_eq!(config.log_filter, "topoview=debug");
    }

    #[test]
    fn load_reports_missing_file_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(EngineError::Io(_))));
    }
}
