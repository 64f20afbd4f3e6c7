use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::info;

use super::launch::LaunchCommandBuilder;
use crate::error::{Result, TrampolineError};
use crate::models::{BuildTool, Ecosystem, MicroServiceId, Settings, instance::LOOPBACK_IP};

/// What one pass of the upgrade rules changed.
#[derive(Debug, Default, PartialEq)]
pub struct UpgradeReport {
    pub changed: bool,
    /// Catalog entries whose launch artifact must be regenerated.
    pub regenerate: Vec<MicroServiceId>,
}

impl UpgradeReport {
    fn regenerate(&mut self, id: &MicroServiceId) {
        self.changed = true;
        if !self.regenerate.contains(id) {
            self.regenerate.push(id.clone());
        }
    }
}

/// Bring a document written by an older version up to date.
pub fn upgrade(ecosystem: &mut Ecosystem, app_version: f32) -> UpgradeReport {
    let mut report = UpgradeReport::default();

    for service in &mut ecosystem.microservices {
        if service.actuator_prefix.is_none() || service.vm_arguments.is_none() {
            service.actuator_prefix.get_or_insert_with(String::new);
            service.vm_arguments.get_or_insert_with(String::new);
            service.build_tool.get_or_insert(BuildTool::Maven);
            report.regenerate(&service.id);
        }
        if service.build_tool.is_none() {
            service.build_tool = Some(BuildTool::Maven);
            report.changed = true;
        }
        if service.version.is_none() {
            service.version = Some(app_version);
            report.regenerate(&service.id);
        }
    }

    for instance in &mut ecosystem.instances {
        if instance.ip.is_none() {
            instance.ip = Some(LOOPBACK_IP.to_string());
            report.changed = true;
        }
    }

    for group in &mut ecosystem.microservices_groups {
        if group.microservices_delays.is_none() {
            group.microservices_delays = Some(vec![0; group.microservices_ids.len()]);
            report.changed = true;
        }
    }

    report
}

/// Owns the single persisted ecosystem document.
///
/// Every access goes through one async lock, so a read-modify-write done via
/// [`EcosystemStore::update`] can never interleave with another writer.
pub struct EcosystemStore {
    settings_folder: PathBuf,
    ecosystem_path: PathBuf,
    app_version: f32,
    scripts: LaunchCommandBuilder,
    lock: Mutex<()>,
}

impl EcosystemStore {
    pub fn new(settings: &Settings, scripts: LaunchCommandBuilder) -> Self {
        Self {
            settings_folder: settings.settings_folder.clone(),
            ecosystem_path: settings.ecosystem_path(),
            app_version: settings.app_version,
            scripts,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ecosystem_path
    }

    /// Read the document, creating it (and its folder) when absent.
    pub async fn load(&self) -> Result<Ecosystem> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Overwrite the document with `ecosystem`.
    pub async fn save(&self, ecosystem: &Ecosystem) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(ecosystem).await
    }

    /// Load, apply `mutate`, and save, holding the store lock throughout.
    /// Nothing is written when `mutate` fails.
    pub async fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Ecosystem) -> Result<T>,
    {
        let _guard = self.lock.lock().await;
        let mut ecosystem = self.read().await?;
        let value = mutate(&mut ecosystem)?;
        self.write(&ecosystem).await?;
        Ok(value)
    }

    async fn ensure_document(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings_folder)
            .await
            .map_err(|e| {
                TrampolineError::SettingsFolderCreation(format!(
                    "{}: {e}",
                    self.settings_folder.display()
                ))
            })?;
        let exists = tokio::fs::try_exists(&self.ecosystem_path)
            .await
            .map_err(|e| {
                TrampolineError::EcosystemRead(format!("{}: {e}", self.ecosystem_path.display()))
            })?;
        if !exists {
            info!(path = %self.ecosystem_path.display(), "creating empty ecosystem");
            let json = serde_json::to_string_pretty(&Ecosystem::default())?;
            tokio::fs::write(&self.ecosystem_path, json)
                .await
                .map_err(|e| {
                    TrampolineError::SettingsFolderCreation(format!(
                        "{}: {e}",
                        self.ecosystem_path.display()
                    ))
                })?;
        }
        Ok(())
    }

    async fn read(&self) -> Result<Ecosystem> {
        self.ensure_document().await?;
        let json = tokio::fs::read_to_string(&self.ecosystem_path)
            .await
            .map_err(|e| TrampolineError::EcosystemRead(format!("failed to read document: {e}")))?;
        let mut ecosystem: Ecosystem = serde_json::from_str(&json)
            .map_err(|e| TrampolineError::EcosystemRead(format!("failed to parse document: {e}")))?;

        let report = upgrade(&mut ecosystem, self.app_version);
        if report.changed {
            for id in &report.regenerate {
                if let Some(service) = ecosystem.find_microservice(id) {
                    self.scripts.write_artifact(service).await?;
                }
            }
            info!(
                regenerated = report.regenerate.len(),
                "upgraded ecosystem document"
            );
            self.write(&ecosystem).await?;
        }
        Ok(ecosystem)
    }

    async fn write(&self, ecosystem: &Ecosystem) -> Result<()> {
        info!("saving ecosystem");
        let json = serde_json::to_string_pretty(ecosystem)?;
        tokio::fs::write(&self.ecosystem_path, json)
            .await
            .map_err(|e| TrampolineError::EcosystemWrite(format!("failed to write document: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateMicroService, MicroService, ServiceDefinition};

    fn store(dir: &Path) -> EcosystemStore {
        let settings = Settings::with_folder(dir);
        EcosystemStore::new(&settings, LaunchCommandBuilder::new(&settings))
    }

    #[tokio::test]
    async fn load_creates_folder_and_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("settings");
        let store = store(&folder);

        let ecosystem = store.load().await.unwrap();
        assert!(ecosystem.microservices.is_empty());
        assert!(ecosystem.instances.is_empty());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn round_trip_ecosystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut ecosystem = Ecosystem::default();
        ecosystem.maven_home_location = Some("/opt/maven".into());
        ecosystem.microservices.push(MicroService::from_create(
            CreateMicroService::new("orders", ServiceDefinition::new("/svc/orders", 8081)),
            1.0,
        ));
        store.save(&ecosystem).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.maven_home_location.as_deref(), Some("/opt/maven"));
        assert_eq!(loaded.microservices.len(), 1);
        assert_eq!(loaded.microservices[0].name, "orders");
    }

    #[tokio::test]
    async fn document_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.load().await.unwrap();

        let json = std::fs::read_to_string(store.path()).unwrap();
        assert!(json.contains("\"gitCredentials\""));
        assert!(json.contains("\"externalInstances\""));
        assert!(json.contains("\"microservicesGroups\""));
        assert!(!json.contains("\"external_instances\""));
    }

    #[tokio::test]
    async fn unparseable_document_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.load().await,
            Err(TrampolineError::EcosystemRead(_))
        ));
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.load().await.unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let result: Result<()> = store
            .update(|ecosystem| {
                ecosystem.maven_home_location = Some("/changed".into());
                Err(TrampolineError::GroupNotFound("g".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn upgrade_fills_every_missing_field() {
        let json = r#"{
            "microservices": [
                {"id": "legacy", "name": "orders", "sourceLocation": "/svc/orders", "defaultPort": 8081}
            ],
            "instances": [
                {"id": "i-1", "name": "orders", "port": 8081}
            ],
            "microservicesGroups": [
                {"id": "g-1", "name": "all", "microservicesIds": ["legacy", "legacy"]}
            ]
        }"#;
        let mut ecosystem: Ecosystem = serde_json::from_str(json).unwrap();

        let report = upgrade(&mut ecosystem, 2.5);
        assert!(report.changed);
        assert_eq!(report.regenerate, vec![MicroServiceId::from("legacy")]);

        let service = &ecosystem.microservices[0];
        assert_eq!(service.build_tool, Some(BuildTool::Maven));
        assert_eq!(service.actuator_prefix.as_deref(), Some(""));
        assert_eq!(service.vm_arguments.as_deref(), Some(""));
        assert_eq!(service.version, Some(2.5));
        assert_eq!(ecosystem.instances[0].ip.as_deref(), Some(LOOPBACK_IP));
        assert_eq!(
            ecosystem.microservices_groups[0].microservices_delays,
            Some(vec![0, 0])
        );

        assert_eq!(upgrade(&mut ecosystem, 2.5), UpgradeReport::default());
    }

    #[test]
    fn upgrade_keeps_present_values() {
        let json = r#"{"microservices": [{"id": "m", "name": "orders", "sourceLocation": "/svc",
            "defaultPort": 8081, "actuatorPrefix": "/manage", "buildTool": "GRADLE", "version": 1.0}]}"#;
        let mut ecosystem: Ecosystem = serde_json::from_str(json).unwrap();

        let report = upgrade(&mut ecosystem, 2.0);
        let service = &ecosystem.microservices[0];
        assert_eq!(service.actuator_prefix.as_deref(), Some("/manage"));
        assert_eq!(service.build_tool, Some(BuildTool::Gradle));
        assert_eq!(service.version, Some(1.0));
        assert_eq!(report.regenerate, vec![MicroServiceId::from("m")]);
    }

    #[tokio::test]
    async fn load_persists_upgrades_and_regenerates_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let json = r#"{"microservices": [{"id": "legacy", "name": "orders",
            "sourceLocation": "/svc/orders", "defaultPort": 8081}]}"#;
        std::fs::write(store.path(), json).unwrap();

        let ecosystem = store.load().await.unwrap();
        assert_eq!(ecosystem.microservices[0].build_tool, Some(BuildTool::Maven));

        let persisted = std::fs::read_to_string(store.path()).unwrap();
        assert!(persisted.contains("\"buildTool\": \"MAVEN\""));
        let scripts = LaunchCommandBuilder::new(&Settings::with_folder(dir.path()));
        assert!(scripts.artifact_path(&MicroServiceId::from("legacy")).exists());
    }
}
