use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// K3d simple config document (k3d.io/v1alpha5, kind Simple)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct K3dSimpleConfig {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: K3dMetadata,

    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_yaml::Value>,
}

impl K3dSimpleConfig {
    pub fn named(name: &str) -> Self {
        Self {
            api_version: "k3d.io/v1alpha5".to_string(),
            kind: "Simple".to_string(),
            metadata: K3dMetadata {
                name: name.to_string(),
            },
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct K3dMetadata {
    #[serde(default)]
    pub name: String,
}

/// Fully resolved k3d cluster config, produced by the config transformer
/// from a simple config. Opaque to the core apart from the name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct K3dClusterConfig {
    pub name: String,
    /// Normalized source document the cluster is created from
    pub config: K3dSimpleConfig,
    /// Filename the document was resolved as, for relative-path handling
    pub source_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_config_roundtrip() {
        let yaml = r#"
apiVersion: k3d.io/v1alpha5
kind: Simple
metadata:
  name: demo
servers: 1
agents: 2
"#;
        let config: K3dSimpleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name(), "demo");
        assert_eq!(
            config.rest.get("agents"),
            Some(&serde_yaml::Value::from(2u64))
        );

        let out = serde_yaml::to_string(&config).unwrap();
        let back: K3dSimpleConfig = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, config);
    }
}
