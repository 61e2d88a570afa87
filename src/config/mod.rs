mod fields;
mod loader;
mod types;
mod validator;

pub use fields::{selectors, FieldSelector, FieldValue, ENV_PREFIX};
pub use loader::{
    build_default_cluster, expand_home, ClusterConfigLoader, LoadedConfig, Overrides, CONFIG_FILE,
};
pub use types::{
    Cluster, ClusterSpec, Cni, Connection, ContainerEngine, Csi, Distribution, GatewayController,
    IngressController, Metadata, MetricsServer, Options, ReconciliationTool, Timeout, API_VERSION,
    KIND,
};
pub use validator::{
    ClusterValidator, ValidationError, ValidationResult, ValidationSummaryError, ValidationWarning,
};
