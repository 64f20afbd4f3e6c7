use std::sync::Arc;

use tracing::{info, warn};

use super::launch::LaunchCommandBuilder;
use super::store::EcosystemStore;
use crate::error::{Result, TrampolineError};
use crate::models::{
    CreateMicroService, Ecosystem, ExternalInstance, ExternalInstanceId, GitCredentials, GroupId,
    HttpsSettings, MicroService, MicroServiceId, MicroservicesGroup, ServiceDefinition, SshSettings,
};

/// Catalog, group, external-endpoint and settings edits.
///
/// Each operation is one serialized load, mutate, save through the store.
pub struct Catalog {
    store: Arc<EcosystemStore>,
    scripts: LaunchCommandBuilder,
    app_version: f32,
}

impl Catalog {
    pub fn new(store: Arc<EcosystemStore>, scripts: LaunchCommandBuilder, app_version: f32) -> Self {
        Self {
            store,
            scripts,
            app_version,
        }
    }

    pub async fn ecosystem(&self) -> Result<Ecosystem> {
        self.store.load().await
    }

    pub async fn set_maven_binary_location(&self, path: &str) -> Result<()> {
        self.store
            .update(|ecosystem| {
                ecosystem.maven_binary_location = Some(path.to_string());
                Ok(())
            })
            .await?;
        info!(path, "maven binary location set");
        Ok(())
    }

    pub async fn set_maven_home_location(&self, path: &str) -> Result<()> {
        self.store
            .update(|ecosystem| {
                ecosystem.maven_home_location = Some(path.to_string());
                Ok(())
            })
            .await?;
        info!(path, "maven home location set");
        Ok(())
    }

    /// Write the launch artifact of a new service, then register it.
    ///
    /// Nothing is recorded when the artifact cannot be written.
    pub async fn set_new_microservice(&self, create: CreateMicroService) -> Result<MicroServiceId> {
        create.validate()?;
        let mut service = MicroService::from_create(create, self.app_version);
        let ecosystem = self.store.load().await?;
        while ecosystem.find_microservice(&service.id).is_some() {
            service.id = MicroServiceId::generate();
        }

        self.scripts.write_artifact(&service).await?;
        let record = service.clone();
        let committed = self
            .store
            .update(move |ecosystem| {
                ecosystem.microservices.push(record);
                Ok(())
            })
            .await;
        if let Err(e) = committed {
            if let Err(cleanup) = self.scripts.remove_artifact(&service.id).await {
                warn!(id = %service.id, "could not remove orphaned launch script: {cleanup}");
            }
            return Err(e);
        }
        info!(service = %service.name, id = %service.id, "microservice registered");
        Ok(service.id)
    }

    /// Regenerate the artifact from the new definition, then store it.
    ///
    /// The document is left untouched when the artifact cannot be written.
    pub async fn update_microservice(
        &self,
        id: &MicroServiceId,
        definition: ServiceDefinition,
    ) -> Result<MicroService> {
        definition.validate()?;
        let ecosystem = self.store.load().await?;
        let previous = ecosystem
            .find_microservice(id)
            .cloned()
            .ok_or_else(|| TrampolineError::MicroserviceNotFound(id.to_string()))?;
        let mut candidate = previous.clone();
        candidate.apply(definition.clone());
        self.scripts.write_artifact(&candidate).await?;

        let committed = self
            .store
            .update(|ecosystem| {
                let service = ecosystem
                    .microservices
                    .iter_mut()
                    .find(|m| &m.id == id)
                    .ok_or_else(|| TrampolineError::MicroserviceNotFound(id.to_string()))?;
                service.apply(definition);
                Ok(service.clone())
            })
            .await;
        let updated = match committed {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(restore) = self.scripts.write_artifact(&previous).await {
                    warn!(id = %id, "could not restore launch script: {restore}");
                }
                return Err(e);
            }
        };
        info!(service = %updated.name, id = %id, "microservice updated");
        Ok(updated)
    }

    /// Remove a service, its group memberships and its launch artifact.
    pub async fn remove_microservice(&self, id: &MicroServiceId) -> Result<()> {
        self.store
            .update(|ecosystem| {
                if ecosystem.remove_microservice(id) {
                    Ok(())
                } else {
                    Err(TrampolineError::MicroserviceNotFound(id.to_string()))
                }
            })
            .await?;
        self.scripts.remove_artifact(id).await?;
        info!(id = %id, "microservice removed");
        Ok(())
    }

    /// Create a group. Every member must exist and have exactly one delay.
    pub async fn set_microservice_group(
        &self,
        name: &str,
        ids: Vec<MicroServiceId>,
        delays: Vec<u64>,
    ) -> Result<GroupId> {
        if name.trim().is_empty() {
            return Err(TrampolineError::InvalidGroup("name is empty".into()));
        }
        if ids.len() != delays.len() {
            return Err(TrampolineError::InvalidGroup(format!(
                "{} members but {} delays",
                ids.len(),
                delays.len()
            )));
        }
        let group = self
            .store
            .update(|ecosystem| {
                if let Some(unknown) = ids.iter().find(|id| ecosystem.find_microservice(id).is_none()) {
                    return Err(TrampolineError::InvalidGroup(format!(
                        "unknown microservice '{unknown}'"
                    )));
                }
                let group = MicroservicesGroup::new(name.to_string(), ids, delays);
                ecosystem.microservices_groups.push(group.clone());
                Ok(group)
            })
            .await?;
        info!(group = %group.name, id = %group.id, members = group.microservices_ids.len(), "group created");
        Ok(group.id)
    }

    pub async fn remove_group(&self, id: &GroupId) -> Result<()> {
        self.store
            .update(|ecosystem| {
                if ecosystem.remove_group(id) {
                    Ok(())
                } else {
                    Err(TrampolineError::GroupNotFound(id.to_string()))
                }
            })
            .await?;
        info!(id = %id, "group removed");
        Ok(())
    }

    pub async fn set_new_external_instance(
        &self,
        name: &str,
        port: u16,
        actuator_prefix: &str,
        ip: &str,
    ) -> Result<ExternalInstanceId> {
        let external = ExternalInstance {
            id: ExternalInstanceId::generate(),
            name: name.to_string(),
            ip: ip.to_string(),
            port,
            actuator_prefix: actuator_prefix.to_string(),
        };
        let id = external.id.clone();
        self.store
            .update(move |ecosystem| {
                ecosystem.external_instances.push(external);
                Ok(())
            })
            .await?;
        info!(name, id = %id, "external instance registered");
        Ok(id)
    }

    pub async fn remove_external_instance(&self, id: &ExternalInstanceId) -> Result<()> {
        self.store
            .update(|ecosystem| {
                if ecosystem.remove_external_instance(id) {
                    Ok(())
                } else {
                    Err(TrampolineError::ExternalInstanceNotFound(id.to_string()))
                }
            })
            .await?;
        info!(id = %id, "external instance removed");
        Ok(())
    }

    /// Store https credentials; ssh credentials are kept.
    pub async fn save_git_https_cred(&self, username: &str, pass: &str) -> Result<()> {
        let https = HttpsSettings {
            username: username.to_string(),
            pass: pass.to_string(),
        };
        self.store
            .update(move |ecosystem| {
                ecosystem.git_credentials.https_settings = Some(https);
                Ok(())
            })
            .await?;
        info!("git https credentials saved");
        Ok(())
    }

    /// Store ssh credentials; https credentials are kept.
    pub async fn save_git_ssh_cred(&self, key_location: &str, key_password: &str) -> Result<()> {
        let ssh = SshSettings {
            ssh_key_location: key_location.to_string(),
            ssh_key_password: key_password.to_string(),
        };
        self.store
            .update(move |ecosystem| {
                ecosystem.git_credentials.ssh_settings = Some(ssh);
                Ok(())
            })
            .await?;
        info!("git ssh credentials saved");
        Ok(())
    }

    pub async fn clean_git_cred(&self) -> Result<()> {
        self.store
            .update(|ecosystem| {
                ecosystem.git_credentials = GitCredentials::default();
                Ok(())
            })
            .await?;
        info!("git credentials cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildTool, Settings};
    use tempfile::TempDir;

    fn catalog() -> (TempDir, Catalog, LaunchCommandBuilder) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_folder(dir.path());
        let scripts = LaunchCommandBuilder::new(&settings);
        let store = Arc::new(EcosystemStore::new(&settings, scripts.clone()));
        let catalog = Catalog::new(store, scripts.clone(), 2.0);
        (dir, catalog, scripts)
    }

    fn catalog_in(folder: &std::path::Path, templates_dir: Option<&std::path::Path>) -> Catalog {
        let mut settings = Settings::with_folder(folder);
        settings.templates_dir = templates_dir.map(|dir| dir.to_path_buf());
        let scripts = LaunchCommandBuilder::new(&settings);
        let store = Arc::new(EcosystemStore::new(&settings, scripts.clone()));
        Catalog::new(store, scripts, 2.0)
    }

    fn orders() -> CreateMicroService {
        CreateMicroService::new("orders", ServiceDefinition::new("/svc/orders", 8081))
    }

    #[tokio::test]
    async fn new_microservice_gets_fresh_id_and_artifact() {
        let (_dir, catalog, scripts) = catalog();
        let first = catalog.set_new_microservice(orders()).await.unwrap();
        let second = catalog.set_new_microservice(orders()).await.unwrap();
        assert_ne!(first, second);

        let ecosystem = catalog.ecosystem().await.unwrap();
        assert_eq!(ecosystem.microservices.len(), 2);
        let service = ecosystem.find_microservice(&first).unwrap();
        assert_eq!(service.version, Some(2.0));
        assert_eq!(service.build_tool(), BuildTool::Maven);
        assert!(scripts.artifact_path(&first).exists());
    }

    #[tokio::test]
    async fn invalid_microservice_is_rejected() {
        let (_dir, catalog, _) = catalog();
        let create = CreateMicroService::new("orders", ServiceDefinition::new("/svc/orders", 80));
        assert!(matches!(
            catalog.set_new_microservice(create).await,
            Err(TrampolineError::InvalidMicroservice(_))
        ));
        assert!(catalog.ecosystem().await.unwrap().microservices.is_empty());
    }

    #[tokio::test]
    async fn unwritable_artifact_leaves_catalog_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-templates");
        let catalog = catalog_in(dir.path(), Some(&missing));

        let result = catalog.set_new_microservice(orders()).await;
        assert!(matches!(result, Err(TrampolineError::ScriptCreation(_))));
        assert!(catalog.ecosystem().await.unwrap().microservices.is_empty());
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_definition_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let id = catalog_in(dir.path(), None)
            .set_new_microservice(orders())
            .await
            .unwrap();
        let scripts = LaunchCommandBuilder::new(&Settings::with_folder(dir.path()));
        let before = std::fs::read_to_string(scripts.artifact_path(&id)).unwrap();

        let missing = dir.path().join("no-templates");
        let broken = catalog_in(dir.path(), Some(&missing));
        let result = broken
            .update_microservice(&id, ServiceDefinition::new("/svc/orders-v2", 9090))
            .await;
        assert!(matches!(result, Err(TrampolineError::ScriptCreation(_))));

        let ecosystem = broken.ecosystem().await.unwrap();
        let service = ecosystem.find_microservice(&id).unwrap();
        assert_eq!(service.source_location, "/svc/orders");
        assert_eq!(service.default_port, 8081);
        let after = std::fs::read_to_string(scripts.artifact_path(&id)).unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn update_rewrites_fields_and_artifact() {
        let (_dir, catalog, scripts) = catalog();
        let id = catalog.set_new_microservice(orders()).await.unwrap();

        let mut definition = ServiceDefinition::new("/svc/orders-v2", 9090);
        definition.build_tool = Some(BuildTool::Gradle);
        let updated = catalog.update_microservice(&id, definition).await.unwrap();
        assert_eq!(updated.default_port, 9090);
        assert_eq!(updated.build_tool(), BuildTool::Gradle);

        let script = std::fs::read_to_string(scripts.artifact_path(&id)).unwrap();
        assert!(script.contains("/svc/orders-v2"));
        assert!(script.contains("gradlew"));

        let missing = catalog
            .update_microservice(&MicroServiceId::from("nope"), ServiceDefinition::new("/x", 9000))
            .await;
        assert!(matches!(missing, Err(TrampolineError::MicroserviceNotFound(_))));
    }

    #[tokio::test]
    async fn removing_microservice_prunes_groups_and_artifact() {
        let (_dir, catalog, scripts) = catalog();
        let a = catalog.set_new_microservice(orders()).await.unwrap();
        let b = catalog.set_new_microservice(orders()).await.unwrap();
        let group = catalog
            .set_microservice_group("all", vec![a.clone(), b.clone(), a.clone()], vec![0, 3, 5])
            .await
            .unwrap();

        catalog.remove_microservice(&a).await.unwrap();

        let ecosystem = catalog.ecosystem().await.unwrap();
        assert!(ecosystem.find_microservice(&a).is_none());
        let group = ecosystem.find_group(&group).unwrap();
        assert_eq!(group.microservices_ids, vec![b]);
        assert_eq!(group.microservices_delays, Some(vec![3]));
        assert!(!scripts.artifact_path(&a).exists());
    }

    #[tokio::test]
    async fn group_members_must_exist_and_match_delays() {
        let (_dir, catalog, _) = catalog();
        let a = catalog.set_new_microservice(orders()).await.unwrap();

        let mismatched = catalog
            .set_microservice_group("g", vec![a.clone()], vec![0, 1])
            .await;
        assert!(matches!(mismatched, Err(TrampolineError::InvalidGroup(_))));

        let unknown = catalog
            .set_microservice_group("g", vec![a, MicroServiceId::from("ghost")], vec![0, 1])
            .await;
        assert!(matches!(unknown, Err(TrampolineError::InvalidGroup(_))));
        assert!(catalog.ecosystem().await.unwrap().microservices_groups.is_empty());
    }

    #[tokio::test]
    async fn remove_group_and_missing_group() {
        let (_dir, catalog, _) = catalog();
        let a = catalog.set_new_microservice(orders()).await.unwrap();
        let group = catalog.set_microservice_group("g", vec![a], vec![1]).await.unwrap();

        catalog.remove_group(&group).await.unwrap();
        assert!(matches!(
            catalog.remove_group(&group).await,
            Err(TrampolineError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn external_instances_are_registered_and_removed() {
        let (_dir, catalog, _) = catalog();
        let id = catalog
            .set_new_external_instance("billing", 9000, "/actuator", "10.0.0.7")
            .await
            .unwrap();
        let ecosystem = catalog.ecosystem().await.unwrap();
        assert_eq!(ecosystem.find_external_instance(&id).unwrap().port, 9000);

        catalog.remove_external_instance(&id).await.unwrap();
        assert!(matches!(
            catalog.remove_external_instance(&id).await,
            Err(TrampolineError::ExternalInstanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn git_credentials_are_stored_verbatim() {
        let (_dir, catalog, _) = catalog();
        catalog.save_git_https_cred("dev", "s3cret").await.unwrap();
        catalog.save_git_ssh_cred("/home/dev/.ssh/id_rsa", "").await.unwrap();

        let credentials = catalog.ecosystem().await.unwrap().git_credentials;
        assert_eq!(credentials.https_settings.unwrap().pass, "s3cret");
        assert_eq!(
            credentials.ssh_settings.unwrap().ssh_key_location,
            "/home/dev/.ssh/id_rsa"
        );

        catalog.clean_git_cred().await.unwrap();
        let credentials = catalog.ecosystem().await.unwrap().git_credentials;
        assert_eq!(credentials, GitCredentials::default());
    }

    #[tokio::test]
    async fn maven_locations_are_saved() {
        let (_dir, catalog, _) = catalog();
        catalog.set_maven_home_location("/opt/maven").await.unwrap();
        catalog.set_maven_binary_location("/opt/maven/bin").await.unwrap();
        let ecosystem = catalog.ecosystem().await.unwrap();
        assert_eq!(ecosystem.maven_home_location.as_deref(), Some("/opt/maven"));
        assert_eq!(ecosystem.maven_binary_dir().as_deref(), Some("/opt/maven/bin"));
    }
}
