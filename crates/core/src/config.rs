use serde::{Deserialize, Serialize};

const DEFAULT_ENTITIES_CONTAINER: &str = "Entities";

/// Manager settings exposed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the child of the scene root that holds materialized entities.
    /// Found or created when the manager attaches to a scene.
    pub entities_container: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            entities_container: DEFAULT_ENTITIES_CONTAINER.to_owned(),
        }
    }
}

impl ManagerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
