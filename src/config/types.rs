use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// API version accepted for cluster documents.
pub const API_VERSION: &str = "ksail.dev/v1alpha1";

/// Kind accepted for cluster documents.
pub const KIND: &str = "Cluster";

/// Root cluster document (ksail.yaml)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub spec: ClusterSpec,
}

impl Cluster {
    /// A document with identity fields populated and everything else zeroed.
    /// Field-selector defaults are layered on by the loader.
    pub fn empty() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

/// Cluster specification
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Kubernetes distribution backing the cluster
    #[serde(default)]
    pub distribution: Option<Distribution>,

    /// Path to the distribution-specific config, relative to this document
    #[serde(default)]
    pub distribution_config: String,

    /// Container engine the distribution runs on
    #[serde(default)]
    pub container_engine: Option<ContainerEngine>,

    /// Controller installed after provisioning
    #[serde(default)]
    pub reconciliation_tool: Option<ReconciliationTool>,

    #[serde(default)]
    pub cni: Cni,

    #[serde(default)]
    pub csi: Csi,

    #[serde(default)]
    pub ingress_controller: IngressController,

    #[serde(default)]
    pub gateway_controller: GatewayController,

    #[serde(default)]
    pub metrics_server: MetricsServer,

    /// Directory holding the workload manifests
    #[serde(default)]
    pub source_directory: String,

    #[serde(default)]
    pub connection: Connection,

    #[serde(default)]
    pub options: Options,
}

/// Cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub kubeconfig: String,

    #[serde(default)]
    pub context: String,

    #[serde(default)]
    pub timeout: Timeout,
}

/// Per-tool option groups, opaque to the core
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Options {
    #[serde(default)]
    pub flux: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub helm: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub kustomize: BTreeMap<String, serde_yaml::Value>,
}

/// Kubernetes distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    Kind,
    K3d,
    /// Reserved, not yet provisionable
    Tind,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Kind => "Kind",
            Distribution::K3d => "K3d",
            Distribution::Tind => "Tind",
        }
    }

    /// Terminal default cluster name for this distribution
    pub fn default_cluster_name(&self) -> &'static str {
        match self {
            Distribution::Kind | Distribution::Tind => "kind",
            Distribution::K3d => "k3d",
        }
    }

    /// Kubeconfig context name for a cluster of this distribution
    pub fn context_for(&self, cluster_name: &str) -> String {
        match self {
            Distribution::Kind | Distribution::Tind => format!("kind-{cluster_name}"),
            Distribution::K3d => format!("k3d-{cluster_name}"),
        }
    }

    /// Conventional filename of the distribution config
    pub fn default_config_file(&self) -> &'static str {
        match self {
            Distribution::Kind | Distribution::Tind => "kind.yaml",
            Distribution::K3d => "k3d.yaml",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kind" => Ok(Distribution::Kind),
            "k3d" => Ok(Distribution::K3d),
            "tind" => Ok(Distribution::Tind),
            _ => anyhow::bail!("unknown distribution '{s}' (expected Kind or K3d)"),
        }
    }
}

/// Container engine the cluster nodes run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerEngine {
    Docker,
    Podman,
}

impl ContainerEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerEngine::Docker => "Docker",
            ContainerEngine::Podman => "Podman",
        }
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(ContainerEngine::Docker),
            "podman" => Ok(ContainerEngine::Podman),
            _ => anyhow::bail!("unknown container engine '{s}' (expected Docker or Podman)"),
        }
    }
}

/// Reconciliation tool installed into the cluster after provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationTool {
    Kubectl,
    Flux,
    /// Reserved, not yet installable
    ArgoCD,
}

impl ReconciliationTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationTool::Kubectl => "Kubectl",
            ReconciliationTool::Flux => "Flux",
            ReconciliationTool::ArgoCD => "ArgoCD",
        }
    }
}

impl fmt::Display for ReconciliationTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationTool {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kubectl" => Ok(ReconciliationTool::Kubectl),
            "flux" => Ok(ReconciliationTool::Flux),
            "argocd" => Ok(ReconciliationTool::ArgoCD),
            _ => anyhow::bail!("unknown reconciliation tool '{s}' (expected Kubectl or Flux)"),
        }
    }
}

/// CNI selection; `Default` keeps the distribution's bundled CNI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cni {
    #[default]
    Default,
    Cilium,
    Istio,
    None,
}

impl Cni {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cni::Default => "Default",
            Cni::Cilium => "Cilium",
            Cni::Istio => "Istio",
            Cni::None => "None",
        }
    }

    /// True when the selection replaces the distribution's default CNI
    pub fn replaces_default(&self) -> bool {
        matches!(self, Cni::Cilium | Cni::Istio)
    }
}

impl fmt::Display for Cni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cni {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Cni::Default),
            "cilium" => Ok(Cni::Cilium),
            "istio" => Ok(Cni::Istio),
            "none" => Ok(Cni::None),
            _ => anyhow::bail!("unknown cni '{s}'"),
        }
    }
}

/// CSI selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Csi {
    #[default]
    Default,
    LocalPathStorage,
    None,
}

impl Csi {
    pub fn as_str(&self) -> &'static str {
        match self {
            Csi::Default => "Default",
            Csi::LocalPathStorage => "LocalPathStorage",
            Csi::None => "None",
        }
    }
}

impl fmt::Display for Csi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Csi {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Csi::Default),
            "localpathstorage" => Ok(Csi::LocalPathStorage),
            "none" => Ok(Csi::None),
            _ => anyhow::bail!("unknown csi '{s}'"),
        }
    }
}

/// Ingress controller selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IngressController {
    #[default]
    Default,
    Traefik,
    None,
}

impl IngressController {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngressController::Default => "Default",
            IngressController::Traefik => "Traefik",
            IngressController::None => "None",
        }
    }
}

impl fmt::Display for IngressController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngressController {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(IngressController::Default),
            "traefik" => Ok(IngressController::Traefik),
            "none" => Ok(IngressController::None),
            _ => anyhow::bail!("unknown ingress controller '{s}'"),
        }
    }
}

/// Gateway controller selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GatewayController {
    #[default]
    Default,
    None,
}

impl GatewayController {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayController::Default => "Default",
            GatewayController::None => "None",
        }
    }
}

impl fmt::Display for GatewayController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayController {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(GatewayController::Default),
            "none" => Ok(GatewayController::None),
            _ => anyhow::bail!("unknown gateway controller '{s}'"),
        }
    }
}

/// Metrics server selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MetricsServer {
    #[default]
    Default,
    Enabled,
    Disabled,
}

impl MetricsServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsServer::Default => "Default",
            MetricsServer::Enabled => "Enabled",
            MetricsServer::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for MetricsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricsServer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(MetricsServer::Default),
            "enabled" | "true" => Ok(MetricsServer::Enabled),
            "disabled" | "false" => Ok(MetricsServer::Disabled),
            _ => anyhow::bail!("unknown metrics server setting '{s}'"),
        }
    }
}

/// Operation timeout with a compact textual surface form ("30s", "1m", "1m30s")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout(pub Duration);

impl Timeout {
    #[allow(dead_code)]
    pub fn from_secs(secs: u64) -> Self {
        Timeout(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout(d)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = self.0.as_millis();
        if total_ms == 0 {
            return f.write_str("0s");
        }
        if total_ms % 1000 != 0 {
            return write!(f, "{total_ms}ms");
        }
        let mut secs = self.0.as_secs();
        let hours = secs / 3600;
        secs %= 3600;
        let mins = secs / 60;
        secs %= 60;
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if mins > 0 {
            write!(f, "{mins}m")?;
        }
        if secs > 0 {
            write!(f, "{secs}s")?;
        }
        Ok(())
    }
}

impl FromStr for Timeout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty duration");
        }

        // Bare numbers are seconds
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(Timeout(Duration::from_secs(secs)));
        }

        let mut total = Duration::ZERO;
        let mut digits = String::new();
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }

            let value: u64 = digits
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid duration '{s}'"))?;
            digits.clear();

            let unit = match c {
                'h' => Duration::from_secs(value * 3600),
                'm' => {
                    if chars.peek() == Some(&'s') {
                        chars.next();
                        Duration::from_millis(value)
                    } else {
                        Duration::from_secs(value * 60)
                    }
                }
                's' => Duration::from_secs(value),
                _ => anyhow::bail!("invalid duration unit '{c}' in '{s}'"),
            };
            total += unit;
        }

        if !digits.is_empty() {
            anyhow::bail!("trailing number without unit in '{s}'");
        }

        Ok(Timeout(total))
    }
}

impl Serialize for Timeout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct TimeoutVisitor;

        impl<'de> Visitor<'de> for TimeoutVisitor {
            type Value = Timeout;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration string like \"30s\" or \"1m\", or seconds")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Timeout(Duration::from_secs(value)))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value >= 0 {
                    Ok(Timeout(Duration::from_secs(value as u64)))
                } else {
                    Err(de::Error::custom("duration cannot be negative"))
                }
            }
        }

        deserializer.deserialize_any(TimeoutVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_parse() {
        assert_eq!("30s".parse::<Timeout>().unwrap(), Timeout::from_secs(30));
        assert_eq!("1m".parse::<Timeout>().unwrap(), Timeout::from_secs(60));
        assert_eq!("1m30s".parse::<Timeout>().unwrap(), Timeout::from_secs(90));
        assert_eq!("2h".parse::<Timeout>().unwrap(), Timeout::from_secs(7200));
        assert_eq!(
            "500ms".parse::<Timeout>().unwrap(),
            Timeout(Duration::from_millis(500))
        );
        assert_eq!("300".parse::<Timeout>().unwrap(), Timeout::from_secs(300));
        assert!("".parse::<Timeout>().is_err());
        assert!("5x".parse::<Timeout>().is_err());
        assert!("m5".parse::<Timeout>().is_err());
    }

    #[test]
    fn test_timeout_display_roundtrip() {
        for text in ["30s", "1m", "1m30s", "2h", "500ms"] {
            let parsed: Timeout = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_enum_from_str_is_case_insensitive() {
        assert_eq!("kind".parse::<Distribution>().unwrap(), Distribution::Kind);
        assert_eq!("K3D".parse::<Distribution>().unwrap(), Distribution::K3d);
        assert_eq!(
            "podman".parse::<ContainerEngine>().unwrap(),
            ContainerEngine::Podman
        );
        assert_eq!(
            "flux".parse::<ReconciliationTool>().unwrap(),
            ReconciliationTool::Flux
        );
        assert!("minikube".parse::<Distribution>().is_err());
    }

    #[test]
    fn test_cluster_document_roundtrip() {
        let yaml = r#"
apiVersion: ksail.dev/v1alpha1
kind: Cluster
metadata:
  name: demo
spec:
  distribution: K3d
  distributionConfig: k3d.yaml
  containerEngine: Docker
  reconciliationTool: Flux
  cni: Cilium
  sourceDirectory: k8s
  connection:
    kubeconfig: ~/.kube/config
    context: k3d-demo
    timeout: 5m
"#;
        let cluster: Cluster = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cluster.metadata.name, "demo");
        assert_eq!(cluster.spec.distribution, Some(Distribution::K3d));
        assert_eq!(cluster.spec.cni, Cni::Cilium);
        assert_eq!(cluster.spec.connection.timeout, Timeout::from_secs(300));

        let out = serde_yaml::to_string(&cluster).unwrap();
        let back: Cluster = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, cluster);
    }

    #[test]
    fn test_context_for() {
        assert_eq!(Distribution::Kind.context_for("demo"), "kind-demo");
        assert_eq!(Distribution::K3d.context_for("demo"), "k3d-demo");
    }
}
