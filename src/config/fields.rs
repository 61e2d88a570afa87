//! Field selectors for the cluster document
//!
//! A selector ties one configuration field to its flag name, environment
//! variable, help text, and registered default. The loader walks the selector
//! table to bind environment overrides and to fill still-empty fields with
//! their defaults after all layers have been applied.

use anyhow::{Context, Result};
use std::str::FromStr;

use super::types::{
    Cluster, Cni, Csi, GatewayController, IngressController, MetricsServer, Timeout,
};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "KSAIL";

/// A configuration field reachable through a selector.
///
/// The trait is the type switch behind flag/env decoding: plain strings,
/// closed enums (via their `FromStr`), and durations all decode through
/// `set_text`, and `is_unset` decides whether a lower layer may fill the
/// field in.
pub trait FieldValue {
    fn set_text(&mut self, text: &str) -> Result<()>;
    fn is_unset(&self) -> bool;
}

impl FieldValue for String {
    fn set_text(&mut self, text: &str) -> Result<()> {
        *self = text.to_string();
        Ok(())
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl FieldValue for Timeout {
    fn set_text(&mut self, text: &str) -> Result<()> {
        *self = text.parse()?;
        Ok(())
    }

    fn is_unset(&self) -> bool {
        self.is_zero()
    }
}

impl<T> FieldValue for Option<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    fn set_text(&mut self, text: &str) -> Result<()> {
        *self = Some(text.parse()?);
        Ok(())
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

macro_rules! sentinel_field_value {
    ($ty:ty) => {
        impl FieldValue for $ty {
            fn set_text(&mut self, text: &str) -> Result<()> {
                *self = text.parse()?;
                Ok(())
            }

            fn is_unset(&self) -> bool {
                matches!(self, <$ty>::Default)
            }
        }
    };
}

sentinel_field_value!(Cni);
sentinel_field_value!(Csi);
sentinel_field_value!(IngressController);
sentinel_field_value!(GatewayController);
sentinel_field_value!(MetricsServer);

/// One entry of the selector table
pub struct FieldSelector {
    /// Dotted field path in document casing, e.g. `spec.sourceDirectory`
    pub path: &'static str,
    /// Single-letter flag shorthand, where one is assigned
    #[allow(dead_code)]
    pub shorthand: Option<char>,
    #[allow(dead_code)]
    pub description: &'static str,
    /// Registered default in textual form; empty means no default
    pub default: &'static str,
    pub access: fn(&mut Cluster) -> &mut dyn FieldValue,
}

impl FieldSelector {
    /// Canonical flag name: the kebab-cased final path segment
    pub fn flag_name(&self) -> String {
        let segment = self.path.rsplit('.').next().unwrap_or(self.path);
        kebab_case(segment)
    }

    /// Environment variable bound to this field, e.g. `KSAIL_SPEC_SOURCE_DIRECTORY`
    pub fn env_var(&self) -> String {
        let mut out = String::from(ENV_PREFIX);
        for segment in self.path.split('.') {
            out.push('_');
            out.push_str(&screaming_case(segment));
        }
        out
    }

    /// Fill the field with the registered default when it is still unset
    pub fn fill_default(&self, cluster: &mut Cluster) -> Result<()> {
        if self.default.is_empty() {
            return Ok(());
        }
        let field = (self.access)(cluster);
        if field.is_unset() {
            field
                .set_text(self.default)
                .with_context(|| format!("invalid default for {}", self.path))?;
        }
        Ok(())
    }
}

/// The full selector table for the cluster document
pub fn selectors() -> Vec<FieldSelector> {
    vec![
        FieldSelector {
            path: "metadata.name",
            shorthand: Some('n'),
            description: "Name of the cluster",
            default: "ksail-default",
            access: |c| &mut c.metadata.name,
        },
        FieldSelector {
            path: "spec.distribution",
            shorthand: Some('d'),
            description: "Kubernetes distribution to provision",
            default: "Kind",
            access: |c| &mut c.spec.distribution,
        },
        FieldSelector {
            path: "spec.distributionConfig",
            shorthand: None,
            description: "Path to the distribution configuration file",
            // Derived from the distribution after layering
            default: "",
            access: |c| &mut c.spec.distribution_config,
        },
        FieldSelector {
            path: "spec.containerEngine",
            shorthand: None,
            description: "Container engine running the cluster nodes",
            default: "Docker",
            access: |c| &mut c.spec.container_engine,
        },
        FieldSelector {
            path: "spec.reconciliationTool",
            shorthand: Some('r'),
            description: "Tool installed to reconcile workload manifests",
            default: "Kubectl",
            access: |c| &mut c.spec.reconciliation_tool,
        },
        FieldSelector {
            path: "spec.cni",
            shorthand: None,
            description: "CNI to install, or Default for the distribution's own",
            default: "",
            access: |c| &mut c.spec.cni,
        },
        FieldSelector {
            path: "spec.csi",
            shorthand: None,
            description: "CSI to install, or Default for the distribution's own",
            default: "",
            access: |c| &mut c.spec.csi,
        },
        FieldSelector {
            path: "spec.ingressController",
            shorthand: None,
            description: "Ingress controller to install",
            default: "",
            access: |c| &mut c.spec.ingress_controller,
        },
        FieldSelector {
            path: "spec.gatewayController",
            shorthand: None,
            description: "Gateway controller to install",
            default: "",
            access: |c| &mut c.spec.gateway_controller,
        },
        FieldSelector {
            path: "spec.metricsServer",
            shorthand: None,
            description: "Whether to install a metrics server",
            default: "",
            access: |c| &mut c.spec.metrics_server,
        },
        FieldSelector {
            path: "spec.sourceDirectory",
            shorthand: Some('s'),
            description: "Directory holding the workload manifests",
            default: "k8s",
            access: |c| &mut c.spec.source_directory,
        },
        FieldSelector {
            path: "spec.connection.kubeconfig",
            shorthand: Some('k'),
            description: "Path to the kubeconfig file",
            default: "~/.kube/config",
            access: |c| &mut c.spec.connection.kubeconfig,
        },
        FieldSelector {
            path: "spec.connection.context",
            shorthand: Some('c'),
            description: "Kubeconfig context to use",
            default: "",
            access: |c| &mut c.spec.connection.context,
        },
        FieldSelector {
            path: "spec.connection.timeout",
            shorthand: Some('t'),
            description: "Timeout for cluster operations (e.g. 30s, 5m)",
            default: "5m",
            access: |c| &mut c.spec.connection.timeout,
        },
    ]
}

fn kebab_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn screaming_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c);
        } else {
            out.push(c.to_ascii_uppercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Distribution;

    fn selector(path: &str) -> FieldSelector {
        selectors()
            .into_iter()
            .find(|s| s.path == path)
            .unwrap_or_else(|| panic!("no selector for {path}"))
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(selector("spec.distribution").flag_name(), "distribution");
        assert_eq!(
            selector("spec.sourceDirectory").flag_name(),
            "source-directory"
        );
        assert_eq!(selector("spec.connection.timeout").flag_name(), "timeout");
        assert_eq!(selector("metadata.name").flag_name(), "name");
    }

    #[test]
    fn test_shorthands() {
        assert_eq!(selector("spec.distribution").shorthand, Some('d'));
        assert_eq!(selector("spec.connection.context").shorthand, Some('c'));
        assert_eq!(selector("spec.connection.kubeconfig").shorthand, Some('k'));
        assert_eq!(selector("spec.connection.timeout").shorthand, Some('t'));
        assert_eq!(selector("spec.sourceDirectory").shorthand, Some('s'));
    }

    #[test]
    fn test_env_vars() {
        assert_eq!(
            selector("spec.distribution").env_var(),
            "KSAIL_SPEC_DISTRIBUTION"
        );
        assert_eq!(
            selector("spec.sourceDirectory").env_var(),
            "KSAIL_SPEC_SOURCE_DIRECTORY"
        );
        assert_eq!(
            selector("spec.connection.timeout").env_var(),
            "KSAIL_SPEC_CONNECTION_TIMEOUT"
        );
    }

    #[test]
    fn test_fill_default_only_when_unset() {
        let mut cluster = Cluster::empty();
        selector("spec.distribution").fill_default(&mut cluster).unwrap();
        assert_eq!(cluster.spec.distribution, Some(Distribution::Kind));

        cluster.spec.distribution = Some(Distribution::K3d);
        selector("spec.distribution").fill_default(&mut cluster).unwrap();
        assert_eq!(cluster.spec.distribution, Some(Distribution::K3d));
    }

    #[test]
    fn test_duration_decodes_through_field_value() {
        let mut cluster = Cluster::empty();
        let sel = selector("spec.connection.timeout");
        (sel.access)(&mut cluster).set_text("1m").unwrap();
        assert_eq!(cluster.spec.connection.timeout, Timeout::from_secs(60));
    }

    #[test]
    fn test_sentinel_enums_count_as_unset() {
        let mut cluster = Cluster::empty();
        assert!((selector("spec.cni").access)(&mut cluster).is_unset());
        cluster.spec.cni = Cni::Cilium;
        assert!(!(selector("spec.cni").access)(&mut cluster).is_unset());
    }
}
