//! Validation check implementations

use super::{ClusterValidator, ValidationError, ValidationWarning};
use crate::config::types::{Distribution, ReconciliationTool, API_VERSION, KIND};

impl<'a> ClusterValidator<'a> {
    /// Documents read from disk must carry the expected identity
    pub(super) fn check_identity(&mut self) {
        if !self.loaded_from_file {
            return;
        }

        if self.cluster.api_version.is_empty() {
            self.result.add_error(ValidationError::MissingRequiredField {
                field: "apiVersion".to_string(),
            });
        } else if self.cluster.api_version != API_VERSION {
            self.result.add_error(ValidationError::InvalidValue {
                field: "apiVersion".to_string(),
                reason: format!(
                    "'{}' is not supported, expected '{API_VERSION}'",
                    self.cluster.api_version
                ),
            });
        }

        if self.cluster.kind.is_empty() {
            self.result.add_error(ValidationError::MissingRequiredField {
                field: "kind".to_string(),
            });
        } else if self.cluster.kind != KIND {
            self.result.add_error(ValidationError::InvalidValue {
                field: "kind".to_string(),
                reason: format!("'{}' is not supported, expected '{KIND}'", self.cluster.kind),
            });
        }
    }

    pub(super) fn check_required_fields(&mut self) {
        if self.cluster.spec.distribution.is_none() {
            self.result.add_error(ValidationError::MissingRequiredField {
                field: "spec.distribution".to_string(),
            });
        }

        if self.loaded_from_file && self.cluster.spec.distribution_config.is_empty() {
            self.result.add_error(ValidationError::MissingRequiredField {
                field: "spec.distributionConfig".to_string(),
            });
        }
    }

    /// A distribution-config name, when set, must match metadata.name
    pub(super) fn check_config_name(&mut self) {
        let metadata_name = &self.cluster.metadata.name;

        let config_name = match self.cluster.spec.distribution {
            Some(Distribution::Kind) | Some(Distribution::Tind) => {
                self.kind_config.map(|c| c.name.as_str())
            }
            Some(Distribution::K3d) => self.k3d_config.map(|c| c.name()),
            None => None,
        };

        if let Some(config_name) = config_name {
            if !config_name.is_empty() && config_name != metadata_name {
                self.result.add_error(ValidationError::NameMismatch {
                    config_name: config_name.to_string(),
                    metadata_name: metadata_name.clone(),
                });
            }
        }
    }

    /// An explicit context must match the distribution's context convention
    pub(super) fn check_context(&mut self) {
        let context = &self.cluster.spec.connection.context;
        if context.is_empty() {
            return;
        }

        let Some(distribution) = self.cluster.spec.distribution else {
            return;
        };

        let expected = distribution.context_for(&self.cluster.metadata.name);
        if *context != expected {
            self.result.add_error(ValidationError::ContextMismatch {
                context: context.clone(),
                expected,
            });
        }
    }

    /// A CNI that replaces Kind's bundled one needs the default disabled
    pub(super) fn check_default_cni(&mut self) {
        if !self.cluster.spec.cni.replaces_default() {
            return;
        }
        if self.cluster.spec.distribution != Some(Distribution::Kind) {
            return;
        }

        let disabled = self
            .kind_config
            .map(|c| c.disables_default_cni())
            .unwrap_or(false);

        if !disabled {
            self.result.add_error(ValidationError::DefaultCniConflict {
                cni: self.cluster.spec.cni.as_str().to_string(),
            });
        }
    }

    pub(super) fn check_reserved_selections(&mut self) {
        if self.cluster.spec.distribution == Some(Distribution::Tind) {
            self.result.add_warning(ValidationWarning::ReservedSelection {
                field: "spec.distribution".to_string(),
                value: "Tind".to_string(),
            });
        }

        if self.cluster.spec.reconciliation_tool == Some(ReconciliationTool::ArgoCD) {
            self.result.add_warning(ValidationWarning::ReservedSelection {
                field: "spec.reconciliationTool".to_string(),
                value: "ArgoCD".to_string(),
            });
        }
    }

    /// Registry mirrors are passed through to k3d without inspection
    pub(super) fn check_registry_mirrors(&mut self) {
        if let Some(config) = self.k3d_config {
            if config.rest.contains_key("registries") {
                self.result
                    .add_warning(ValidationWarning::UnvalidatedRegistryMirrors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::ClusterValidator;
    use crate::config::types::{Cluster, Distribution, ReconciliationTool};
    use crate::distribution::K3dSimpleConfig;

    #[test]
    fn test_reserved_selections_warn() {
        let mut cluster = Cluster::empty();
        cluster.metadata.name = "demo".to_string();
        cluster.spec.distribution = Some(Distribution::Tind);
        cluster.spec.reconciliation_tool = Some(ReconciliationTool::ArgoCD);

        let result = ClusterValidator::new(&cluster).validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_registry_mirrors_are_advisory() {
        let mut cluster = Cluster::empty();
        cluster.metadata.name = "demo".to_string();
        cluster.spec.distribution = Some(Distribution::K3d);

        let k3d: K3dSimpleConfig = serde_yaml::from_str(
            "apiVersion: k3d.io/v1alpha5\nkind: Simple\nmetadata:\n  name: demo\nregistries:\n  create:\n    name: registry.local",
        )
        .unwrap();

        let result = ClusterValidator::new(&cluster).with_k3d_config(&k3d).validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].to_string().contains("registry"));
    }
}
