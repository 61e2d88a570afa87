use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind cluster document (kind.x-k8s.io/v1alpha4)
///
/// Only the name and the networking block are typed; all remaining fields
/// pass through to the kind backend untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KindConfig {
    #[serde(default)]
    pub kind: String,

    #[serde(rename = "apiVersion", default)]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking: Option<KindNetworking>,

    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_yaml::Value>,
}

impl KindConfig {
    pub fn named(name: &str) -> Self {
        Self {
            kind: "Cluster".to_string(),
            api_version: "kind.x-k8s.io/v1alpha4".to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// True when the document disables Kind's bundled CNI
    pub fn disables_default_cni(&self) -> bool {
        self.networking
            .as_ref()
            .map(|n| n.disable_default_cni)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KindNetworking {
    #[serde(rename = "disableDefaultCNI", default)]
    pub disable_default_cni: bool,

    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_yaml::Value>,
}
