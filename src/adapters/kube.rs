//! Kubernetes API adapters
//!
//! CRD and dynamic-object access behind narrow traits, plus client
//! construction from an explicit kubeconfig path and context.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use std::path::Path;

/// Build a client from a kubeconfig path and context. An empty context uses
/// the kubeconfig's current-context. The file is read before anything else
/// so read failures surface ahead of network calls.
pub async fn build_client(kubeconfig: &Path, context: &str) -> Result<Client> {
    let kubeconfig_data = Kubeconfig::read_from(kubeconfig)
        .with_context(|| format!("failed to read kubeconfig: {}", kubeconfig.display()))?;

    let options = KubeConfigOptions {
        context: Some(context)
            .filter(|c| !c.is_empty())
            .map(String::from),
        ..Default::default()
    };

    let config = Config::from_custom_kubeconfig(kubeconfig_data, &options)
        .await
        .context("failed to build client config from kubeconfig")?;

    Client::try_from(config).context("failed to build Kubernetes client")
}

/// CRUD over CustomResourceDefinitions
#[async_trait]
pub trait CrdApi: Send + Sync {
    async fn get(&self, name: &str) -> Result<CustomResourceDefinition>;
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition>;
    async fn update(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition>;
    async fn delete(&self, name: &str) -> Result<()>;
}

/// CRUD over arbitrary dynamic objects of one group/version/resource
#[async_trait]
pub trait DynamicApi: Send + Sync {
    async fn get(&self, name: &str) -> Result<DynamicObject>;
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject>;
    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject>;
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Production CRD adapter
pub struct KubeCrdApi {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdApi {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdApi for KubeCrdApi {
    async fn get(&self, name: &str) -> Result<CustomResourceDefinition> {
        Ok(self.api.get(name).await?)
    }

    async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
        Ok(self.api.create(&PostParams::default(), crd).await?)
    }

    async fn update(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
        let name = crd
            .metadata
            .name
            .as_deref()
            .context("CRD has no name")?;
        Ok(self.api.replace(name, &PostParams::default(), crd).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Production dynamic-object adapter, cluster-scoped
pub struct KubeDynamicApi {
    api: Api<DynamicObject>,
}

impl KubeDynamicApi {
    pub fn cluster_scoped(client: Client, resource: &ApiResource) -> Self {
        Self {
            api: Api::all_with(client, resource),
        }
    }
}

#[async_trait]
impl DynamicApi for KubeDynamicApi {
    async fn get(&self, name: &str) -> Result<DynamicObject> {
        Ok(self.api.get(name).await?)
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
        Ok(self.api.create(&PostParams::default(), object).await?)
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object
            .metadata
            .name
            .as_deref()
            .context("object has no name")?;
        Ok(self.api.replace(name, &PostParams::default(), object).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// True when the error is a Kubernetes 404
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<kube::Error>(),
        Some(kube::Error::Api(response)) if response.code == 404
    )
}

/// True when the error is a Kubernetes 409 AlreadyExists
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<kube::Error>(),
        Some(kube::Error::Api(response)) if response.code == 409
    )
}

/// Fabricate an API error, for fakes
#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str, message: &str) -> anyhow::Error {
    anyhow::Error::new(kube::Error::Api(Box::new(kube::core::ErrorResponse {
        status: Some(kube::core::response::StatusSummary::Failure),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
        ..Default::default()
    })))
}
