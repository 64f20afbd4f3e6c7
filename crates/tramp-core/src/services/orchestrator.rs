use std::sync::Arc;
use std::time::Duration;

use super::catalog::Catalog;
use super::health;
use super::launch::LaunchCommandBuilder;
use super::lifecycle::InstanceLifecycleManager;
use super::ports::PortAllocator;
use super::scheduler::GroupScheduler;
use super::store::EcosystemStore;
use crate::error::Result;
use crate::models::Settings;

/// Every component wired to one settings folder.
pub struct Orchestrator {
    pub store: Arc<EcosystemStore>,
    pub catalog: Catalog,
    pub lifecycle: Arc<InstanceLifecycleManager>,
    pub groups: GroupScheduler,
}

impl Orchestrator {
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_scripts(settings, LaunchCommandBuilder::new(settings))
    }

    /// Wire the components around a caller-supplied launch builder.
    pub fn with_scripts(settings: &Settings, scripts: LaunchCommandBuilder) -> Result<Self> {
        let store = Arc::new(EcosystemStore::new(settings, scripts.clone()));
        let http = health::client(Duration::from_secs(settings.health_timeout_secs))?;
        let lifecycle = Arc::new(InstanceLifecycleManager::new(
            Arc::clone(&store),
            Arc::new(PortAllocator::new()),
            scripts.clone(),
            http,
        ));
        Ok(Self {
            catalog: Catalog::new(Arc::clone(&store), scripts, settings.app_version),
            groups: GroupScheduler::new(Arc::clone(&store), Arc::clone(&lifecycle)),
            lifecycle,
            store,
        })
    }
}
