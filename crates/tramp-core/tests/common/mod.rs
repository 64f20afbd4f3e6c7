// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::net::TcpListener;
use std::path::PathBuf;

use tempfile::TempDir;

use tramp_core::models::{CreateMicroService, MicroServiceId, ServiceDefinition, Settings};
use tramp_core::services::Orchestrator;

/// An orchestrator rooted in a throwaway settings folder.
pub struct TestEnv {
    pub dir: TempDir,
    pub settings: Settings,
    pub orchestrator: Orchestrator,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_folder(&dir.path().join("settings"));
        settings.health_timeout_secs = 2;
        let orchestrator = Orchestrator::new(&settings).unwrap();
        Self {
            dir,
            settings,
            orchestrator,
        }
    }

    /// An empty folder standing in for a project checkout.
    pub fn source_dir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("sources").join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Register a maven service whose source folder exists but holds no project.
    pub async fn register(&self, name: &str, default_port: u16) -> MicroServiceId {
        let source = self.source_dir(name);
        let definition = ServiceDefinition::new(source.to_string_lossy(), default_port);
        self.orchestrator
            .catalog
            .set_new_microservice(CreateMicroService::new(name, definition))
            .await
            .unwrap()
    }
}

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

