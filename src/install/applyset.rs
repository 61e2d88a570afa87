//! Kubectl ApplySet installer
//!
//! Ensures the cluster-scoped ApplySet CRD and its single parent custom
//! resource exist, so later `kubectl apply` invocations can adopt the parent
//! as their apply set. Both objects follow the same reconcile shape: get,
//! create on not-found, and on a create conflict re-get to pick up the live
//! `resourceVersion` before updating.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use kube::discovery::ApiResource;
use std::sync::Arc;

use super::ReconciliationInstaller;
use crate::adapters::kube::{is_already_exists, is_not_found, CrdApi, DynamicApi};
use crate::context::OpContext;
use crate::poll::{poll_until, POLL_INTERVAL};

/// Name of the ApplySet CRD
pub const CRD_NAME: &str = "applysets.k8s.devantler.tech";

/// Name of the parent ApplySet custom resource
pub const PARENT_NAME: &str = "ksail";

const GROUP: &str = "k8s.devantler.tech";
const VERSION: &str = "v1";
const KIND: &str = "ApplySet";

const CRD_MANIFEST: &str = include_str!("assets/applyset-crd.yaml");
const PARENT_MANIFEST: &str = include_str!("assets/applyset-cr.yaml");

/// API resource coordinates of the parent custom resource
pub fn applyset_api_resource() -> ApiResource {
    ApiResource {
        group: GROUP.to_string(),
        version: VERSION.to_string(),
        kind: KIND.to_string(),
        api_version: format!("{GROUP}/{VERSION}"),
        plural: "applysets".to_string(),
    }
}

pub struct KubectlInstaller {
    crds: Arc<dyn CrdApi>,
    parents: Arc<dyn DynamicApi>,
}

impl KubectlInstaller {
    pub fn new(crds: Arc<dyn CrdApi>, parents: Arc<dyn DynamicApi>) -> Self {
        Self { crds, parents }
    }

    async fn ensure_crd(&self, ctx: &OpContext) -> Result<()> {
        let desired: CustomResourceDefinition =
            serde_yaml::from_str(CRD_MANIFEST).context("failed to parse ApplySet CRD manifest")?;

        match self.crds.get(CRD_NAME).await {
            Ok(existing) => {
                let mut update = desired.clone();
                update.metadata.resource_version = existing.metadata.resource_version;
                self.crds
                    .update(&update)
                    .await
                    .map_err(|err| err.context("failed to update CRD"))?;
            }
            Err(err) if is_not_found(&err) => match self.crds.create(&desired).await {
                Ok(_) => {}
                Err(err) if is_already_exists(&err) => {
                    // Lost the create race; adopt the live object instead
                    let existing = self
                        .crds
                        .get(CRD_NAME)
                        .await
                        .map_err(|err| err.context("failed to get CRD"))?;
                    let mut update = desired.clone();
                    update.metadata.resource_version = existing.metadata.resource_version;
                    self.crds
                        .update(&update)
                        .await
                        .map_err(|err| err.context("failed to update CRD"))?;
                }
                Err(err) => return Err(err.context("failed to create CRD")),
            },
            Err(err) => return Err(err.context("failed to get CRD")),
        }

        self.wait_for_established(ctx)
            .await
            .context("failed to wait for CRD to be established")
    }

    /// Poll the CRD until the apiserver reports it established. Not-found is
    /// non-terminal while the create propagates; rejected names are.
    async fn wait_for_established(&self, ctx: &OpContext) -> Result<()> {
        let crds = self.crds.clone();
        poll_until(ctx, POLL_INTERVAL, move || {
            let crds = crds.clone();
            async move {
                let crd = match crds.get(CRD_NAME).await {
                    Ok(crd) => crd,
                    Err(err) if is_not_found(&err) => return Ok(false),
                    Err(err) => return Err(err),
                };

                let conditions = crd
                    .status
                    .as_ref()
                    .and_then(|status| status.conditions.as_ref());
                let Some(conditions) = conditions else {
                    return Ok(false);
                };

                for condition in conditions {
                    if condition.type_ == "NamesAccepted"
                        && condition.status == "False"
                        && condition.reason.as_deref() == Some("MultipleNamesNotAllowed")
                    {
                        let message = condition.message.as_deref().unwrap_or_default();
                        return Err(anyhow!("crd names not accepted: {message}"));
                    }
                }

                Ok(conditions
                    .iter()
                    .any(|condition| condition.type_ == "Established" && condition.status == "True"))
            }
        })
        .await
    }

    async fn ensure_parent(&self) -> Result<()> {
        let mut desired: DynamicObject =
            serde_yaml::from_str(PARENT_MANIFEST).context("failed to parse ApplySet manifest")?;
        // The manifest deserializes as a bare map; identity comes from code
        desired.types = Some(TypeMeta {
            api_version: format!("{GROUP}/{VERSION}"),
            kind: KIND.to_string(),
        });

        match self.parents.get(PARENT_NAME).await {
            Ok(existing) => {
                desired.metadata.resource_version = existing.metadata.resource_version;
                self.parents
                    .update(&desired)
                    .await
                    .map_err(|err| err.context("failed to update ApplySet"))?;
            }
            Err(err) if is_not_found(&err) => match self.parents.create(&desired).await {
                Ok(_) => {}
                Err(err) if is_already_exists(&err) => {
                    let existing = self
                        .parents
                        .get(PARENT_NAME)
                        .await
                        .map_err(|err| err.context("failed to get ApplySet"))?;
                    desired.metadata.resource_version = existing.metadata.resource_version;
                    self.parents
                        .update(&desired)
                        .await
                        .map_err(|err| err.context("failed to update ApplySet"))?;
                }
                Err(err) => return Err(err.context("failed to create ApplySet")),
            },
            Err(err) => return Err(err.context("failed to get ApplySet")),
        }

        Ok(())
    }
}

#[async_trait]
impl ReconciliationInstaller for KubectlInstaller {
    async fn install(&self, ctx: &OpContext) -> Result<()> {
        self.ensure_crd(ctx).await?;
        self.ensure_parent().await?;
        tracing::info!(crd = CRD_NAME, parent = PARENT_NAME, "ApplySet bootstrap reconciled");
        Ok(())
    }

    /// Best effort: delete the parent, then the CRD. Delete errors,
    /// including not-found and cancellation, are swallowed.
    async fn uninstall(&self, _ctx: &OpContext) -> Result<()> {
        if let Err(err) = self.parents.delete(PARENT_NAME).await {
            tracing::debug!(error = %err, "ignoring ApplySet delete failure");
        }
        if let Err(err) = self.crds.delete(CRD_NAME).await {
            tracing::debug!(error = %err, "ignoring CRD delete failure");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::kube::api_error;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinitionCondition, CustomResourceDefinitionStatus,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn established_crd(resource_version: &str) -> CustomResourceDefinition {
        let mut crd: CustomResourceDefinition = serde_yaml::from_str(CRD_MANIFEST).unwrap();
        crd.metadata.resource_version = Some(resource_version.to_string());
        crd.status = Some(CustomResourceDefinitionStatus {
            conditions: Some(vec![CustomResourceDefinitionCondition {
                type_: "Established".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        crd
    }

    fn names_rejected_crd() -> CustomResourceDefinition {
        let mut crd: CustomResourceDefinition = serde_yaml::from_str(CRD_MANIFEST).unwrap();
        crd.status = Some(CustomResourceDefinitionStatus {
            conditions: Some(vec![CustomResourceDefinitionCondition {
                type_: "NamesAccepted".to_string(),
                status: "False".to_string(),
                reason: Some("MultipleNamesNotAllowed".to_string()),
                message: Some("names conflict with applysets.other.group".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        });
        crd
    }

    /// Scripted CRD fake: queued results per call, recorded invocations
    #[derive(Default)]
    struct FakeCrds {
        get_results: Mutex<VecDeque<Result<CustomResourceDefinition>>>,
        create_results: Mutex<VecDeque<Result<CustomResourceDefinition>>>,
        updates: Mutex<Vec<CustomResourceDefinition>>,
        deletes: Mutex<Vec<String>>,
        delete_result: Mutex<Option<anyhow::Error>>,
    }

    impl FakeCrds {
        fn queue_get(&self, result: Result<CustomResourceDefinition>) {
            self.get_results.lock().unwrap().push_back(result);
        }

        fn queue_create(&self, result: Result<CustomResourceDefinition>) {
            self.create_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl CrdApi for FakeCrds {
        async fn get(&self, _name: &str) -> Result<CustomResourceDefinition> {
            self.get_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(api_error(404, "NotFound", "crd not found")))
        }

        async fn create(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
            self.create_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(crd.clone()))
        }

        async fn update(&self, crd: &CustomResourceDefinition) -> Result<CustomResourceDefinition> {
            self.updates.lock().unwrap().push(crd.clone());
            Ok(crd.clone())
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.deletes.lock().unwrap().push(name.to_string());
            match self.delete_result.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct FakeParents {
        get_results: Mutex<VecDeque<Result<DynamicObject>>>,
        creates: Mutex<Vec<DynamicObject>>,
        updates: Mutex<Vec<DynamicObject>>,
        deletes: Mutex<Vec<String>>,
        delete_result: Mutex<Option<anyhow::Error>>,
    }

    fn parent_object(resource_version: &str) -> DynamicObject {
        let mut object: DynamicObject = serde_yaml::from_str(PARENT_MANIFEST).unwrap();
        object.types = Some(TypeMeta {
            api_version: format!("{GROUP}/{VERSION}"),
            kind: KIND.to_string(),
        });
        object.metadata.resource_version = Some(resource_version.to_string());
        object
    }

    #[async_trait]
    impl DynamicApi for FakeParents {
        async fn get(&self, _name: &str) -> Result<DynamicObject> {
            self.get_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(api_error(404, "NotFound", "applyset not found")))
        }

        async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
            self.creates.lock().unwrap().push(object.clone());
            Ok(object.clone())
        }

        async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
            self.updates.lock().unwrap().push(object.clone());
            Ok(object.clone())
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.deletes.lock().unwrap().push(name.to_string());
            match self.delete_result.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn ctx_with_timeout(timeout: Duration) -> OpContext {
        OpContext::new(CancellationToken::new(), timeout)
    }

    #[tokio::test]
    async fn test_fresh_install_creates_both_objects() {
        let crds = Arc::new(FakeCrds::default());
        // get: not found, then polling sees an established CRD
        crds.queue_get(Err(api_error(404, "NotFound", "no crd")));
        crds.queue_get(Ok(established_crd("1")));

        let parents = Arc::new(FakeParents::default());
        let installer = KubectlInstaller::new(crds.clone(), parents.clone());

        installer
            .install(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        let creates = parents.creates.lock().unwrap();
        assert_eq!(creates.len(), 1);
        let types = creates[0].types.clone().unwrap();
        assert_eq!(types.api_version, "k8s.devantler.tech/v1");
        assert_eq!(types.kind, "ApplySet");
        assert_eq!(creates[0].metadata.name.as_deref(), Some(PARENT_NAME));
    }

    #[tokio::test]
    async fn test_create_race_falls_back_to_update() {
        let crds = Arc::new(FakeCrds::default());
        crds.queue_get(Err(api_error(404, "NotFound", "no crd")));
        crds.queue_create(Err(api_error(409, "AlreadyExists", "crd exists")));
        // re-get after the conflict, then the polling get
        crds.queue_get(Ok(established_crd("42")));
        crds.queue_get(Ok(established_crd("42")));

        let parents = Arc::new(FakeParents::default());
        let installer = KubectlInstaller::new(crds.clone(), parents);

        installer
            .install(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        let updates = crds.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].metadata.resource_version.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_polling_tolerates_not_found_then_established() {
        let crds = Arc::new(FakeCrds::default());
        crds.queue_get(Err(api_error(404, "NotFound", "no crd")));
        // first poll: still not visible; second poll: established
        crds.queue_get(Err(api_error(404, "NotFound", "not yet")));
        crds.queue_get(Ok(established_crd("1")));

        let parents = Arc::new(FakeParents::default());
        let installer = KubectlInstaller::new(crds, parents);

        installer
            .install(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_establishment_timeout_is_wrapped() {
        let crds = Arc::new(FakeCrds::default());
        crds.queue_get(Err(api_error(404, "NotFound", "no crd")));
        // every poll sees a CRD with no conditions yet

        let parents = Arc::new(FakeParents::default());
        let installer = KubectlInstaller::new(crds, parents);

        let err = installer
            .install(&ctx_with_timeout(Duration::from_millis(1)))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to wait for CRD to be established"));
    }

    #[tokio::test]
    async fn test_rejected_names_are_terminal() {
        let crds = Arc::new(FakeCrds::default());
        crds.queue_get(Err(api_error(404, "NotFound", "no crd")));
        crds.queue_get(Ok(names_rejected_crd()));

        let parents = Arc::new(FakeParents::default());
        let installer = KubectlInstaller::new(crds, parents);

        let err = installer
            .install(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("crd names not accepted"));
    }

    #[tokio::test]
    async fn test_second_install_updates_with_prior_resource_version() {
        let crds = Arc::new(FakeCrds::default());
        crds.queue_get(Ok(established_crd("7")));
        crds.queue_get(Ok(established_crd("7")));

        let parents = Arc::new(FakeParents::default());
        parents
            .get_results
            .lock()
            .unwrap()
            .push_back(Ok(parent_object("9")));

        let installer = KubectlInstaller::new(crds.clone(), parents.clone());
        installer
            .install(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(
            crds.updates.lock().unwrap()[0]
                .metadata
                .resource_version
                .as_deref(),
            Some("7")
        );
        assert_eq!(
            parents.updates.lock().unwrap()[0]
                .metadata
                .resource_version
                .as_deref(),
            Some("9")
        );
        assert!(parents.creates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uninstall_swallows_delete_errors() {
        let crds = Arc::new(FakeCrds::default());
        *crds.delete_result.lock().unwrap() =
            Some(api_error(404, "NotFound", "already gone"));
        let parents = Arc::new(FakeParents::default());
        *parents.delete_result.lock().unwrap() = Some(anyhow!("connection reset"));

        let installer = KubectlInstaller::new(crds.clone(), parents.clone());
        installer
            .uninstall(&ctx_with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(*parents.deletes.lock().unwrap(), vec![PARENT_NAME.to_string()]);
        assert_eq!(*crds.deletes.lock().unwrap(), vec![CRD_NAME.to_string()]);
    }
}
