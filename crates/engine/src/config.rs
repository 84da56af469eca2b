//! Extension configuration.
//!
//! Configuration arrives as a flat string-keyed map, either in a host
//! configuration event or from the environment. Blank values count as absent.

use serde_json::{Map, Value};

/// Configuration key holding the edge configuration id.
pub const EDGE_CONFIG_ID_KEY: &str = "edge.configId";
/// Configuration key holding the tracking dataset id.
pub const DATASET_ID_KEY: &str = "optimize.datasetId";

pub const EDGE_CONFIG_ID_ENV: &str = "OPTIMIZE_EDGE_CONFIG_ID";
pub const DATASET_ID_ENV: &str = "OPTIMIZE_DATASET_ID";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeConfig {
    pub edge_config_id: Option<String>,
    pub dataset_id: Option<String>,
}

impl OptimizeConfig {
    pub fn new(edge_config_id: impl Into<String>) -> Self {
        Self {
            edge_config_id: non_blank(edge_config_id.into()),
            dataset_id: None,
        }
    }

    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = non_blank(dataset_id.into());
        self
    }

    /// Read configuration from a flat map. Non-string values are ignored.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let read = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .and_then(|value| non_blank(value.to_string()))
        };

        Self {
            edge_config_id: read(EDGE_CONFIG_ID_KEY),
            dataset_id: read(DATASET_ID_KEY),
        }
    }

    /// Read configuration from `OPTIMIZE_EDGE_CONFIG_ID` and `OPTIMIZE_DATASET_ID`.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().and_then(non_blank);

        Self {
            edge_config_id: read(EDGE_CONFIG_ID_ENV),
            dataset_id: read(DATASET_ID_ENV),
        }
    }

    /// The flat-map form, as carried by configuration events.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(id) = &self.edge_config_id {
            map.insert(EDGE_CONFIG_ID_KEY.to_string(), Value::String(id.clone()));
        }
        if let Some(id) = &self.dataset_id {
            map.insert(DATASET_ID_KEY.to_string(), Value::String(id.clone()));
        }
        map
    }

    /// Whether network requests may be sent.
    pub fn is_configured(&self) -> bool {
        self.edge_config_id.is_some()
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
