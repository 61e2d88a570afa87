//! Cluster document validation
//!
//! Validates the resolved cluster document against itself and against the
//! distribution config it references. Hard errors abort loading; warnings are
//! surfaced through the notifier and do not fail the load.

mod checks;

use crate::config::types::Cluster;
use crate::distribution::{K3dSimpleConfig, KindConfig};

/// Result of running all validation checks
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Terminal error carrying only the counts; per-field detail is emitted
    /// through the notifier before this is returned.
    pub fn summary(&self) -> ValidationSummaryError {
        ValidationSummaryError {
            errors: self.errors.len(),
            warnings: self.warnings.len(),
        }
    }
}

/// Terminal validation error, distinct from runtime failures for exit-code
/// dispatch. Carries counts only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {errors} error(s), {warnings} warning(s)")]
pub struct ValidationSummaryError {
    pub errors: usize,
    pub warnings: usize,
}

/// Hard validation errors that prevent loading
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingRequiredField {
        field: String,
    },
    InvalidValue {
        field: String,
        reason: String,
    },
    NameMismatch {
        config_name: String,
        metadata_name: String,
    },
    ContextMismatch {
        context: String,
        expected: String,
    },
    DefaultCniConflict {
        cni: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingRequiredField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
            ValidationError::NameMismatch {
                config_name,
                metadata_name,
            } => {
                write!(
                    f,
                    "distribution config name '{config_name}' does not match metadata.name '{metadata_name}'"
                )
            }
            ValidationError::ContextMismatch { context, expected } => {
                write!(
                    f,
                    "spec.connection.context: invalid context '{context}', expected '{expected}'"
                )
            }
            ValidationError::DefaultCniConflict { cni } => {
                write!(
                    f,
                    "{cni} CNI requires disableDefaultCNI to be true in the Kind config"
                )
            }
        }
    }
}

/// Soft warnings reported on load
#[derive(Debug, Clone)]
pub enum ValidationWarning {
    ReservedSelection { field: String, value: String },
    UnvalidatedRegistryMirrors,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::ReservedSelection { field, value } => {
                write!(f, "{field}: '{value}' is reserved and not yet supported")
            }
            ValidationWarning::UnvalidatedRegistryMirrors => {
                write!(f, "k3d registry configuration is passed through unvalidated")
            }
        }
    }
}

/// Cluster document validator
pub struct ClusterValidator<'a> {
    pub(super) cluster: &'a Cluster,
    pub(super) kind_config: Option<&'a KindConfig>,
    pub(super) k3d_config: Option<&'a K3dSimpleConfig>,
    /// Identity checks only apply to documents read from disk
    pub(super) loaded_from_file: bool,
    pub(super) result: ValidationResult,
}

impl<'a> ClusterValidator<'a> {
    pub fn new(cluster: &'a Cluster) -> Self {
        Self {
            cluster,
            kind_config: None,
            k3d_config: None,
            loaded_from_file: false,
            result: ValidationResult::default(),
        }
    }

    pub fn loaded_from_file(mut self, loaded: bool) -> Self {
        self.loaded_from_file = loaded;
        self
    }

    pub fn with_kind_config(mut self, config: &'a KindConfig) -> Self {
        self.kind_config = Some(config);
        self
    }

    pub fn with_k3d_config(mut self, config: &'a K3dSimpleConfig) -> Self {
        self.k3d_config = Some(config);
        self
    }

    /// Run all validation checks
    pub fn validate(mut self) -> ValidationResult {
        self.check_identity();
        self.check_required_fields();
        self.check_config_name();
        self.check_context();
        self.check_default_cni();
        self.check_reserved_selections();
        self.check_registry_mirrors();
        self.result
    }
}
