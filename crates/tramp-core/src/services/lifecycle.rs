use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::health;
use super::launch::LaunchCommandBuilder;
use super::ports::PortAllocator;
use super::registry::ProcessRegistry;
use super::runner;
use super::store::EcosystemStore;
use crate::error::{Result, TrampolineError};
use crate::models::{ExternalInstanceId, Instance, InstanceId, InstanceStatus, MicroServiceId};

/// Starts, stops and tracks individual instances.
pub struct InstanceLifecycleManager {
    store: Arc<EcosystemStore>,
    ports: Arc<PortAllocator>,
    scripts: LaunchCommandBuilder,
    registry: ProcessRegistry,
    http: reqwest::Client,
}

impl InstanceLifecycleManager {
    pub fn new(
        store: Arc<EcosystemStore>,
        ports: Arc<PortAllocator>,
        scripts: LaunchCommandBuilder,
        http: reqwest::Client,
    ) -> Self {
        Self {
            store,
            ports,
            scripts,
            registry: ProcessRegistry::new(),
            http,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub async fn start_instance(
        &self,
        service_id: &MicroServiceId,
        port: u16,
        vm_arguments: &str,
        app_arguments: &str,
        delay_secs: u64,
    ) -> Result<Instance> {
        self.start_instance_cancellable(
            service_id,
            port,
            vm_arguments,
            app_arguments,
            delay_secs,
            &CancellationToken::new(),
        )
        .await
    }

    /// Start `service_id` on `port` after waiting `delay_secs`.
    ///
    /// Cancelling `cancel` during the wait fails with `InterruptedWait` and
    /// nothing is spawned.
    pub async fn start_instance_cancellable(
        &self,
        service_id: &MicroServiceId,
        port: u16,
        vm_arguments: &str,
        app_arguments: &str,
        delay_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<Instance> {
        let ecosystem = self.store.load().await?;
        let service = ecosystem
            .find_microservice(service_id)
            .cloned()
            .ok_or_else(|| TrampolineError::MicroserviceNotFound(service_id.to_string()))?;

        if delay_secs > 0 {
            info!(service = %service.name, delay_secs, "waiting before start");
            tokio::select! {
                _ = cancel.cancelled() => return Err(TrampolineError::InterruptedWait),
                _ = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
            }
        }

        self.scripts.prepare_source(&service);
        let invocation = self
            .scripts
            .start_invocation(&service, &ecosystem, port, vm_arguments, app_arguments)
            .await?;
        let child = runner::spawn(&invocation, &service.name)?;

        let instance = Instance::launched(
            InstanceId::generate(),
            &service,
            port,
            vm_arguments,
            app_arguments,
        );
        self.registry.insert(&service.id, &instance.id, child);

        let record = instance.clone();
        self.store
            .update(move |ecosystem| {
                ecosystem.instances.push(record);
                Ok(())
            })
            .await?;
        info!(service = %service.name, instance = %instance.id, port, "instance started");
        Ok(instance)
    }

    /// Start on the first free port at or above the service's default port,
    /// using the service's default arguments.
    pub async fn start_on_free_port(
        &self,
        service_id: &MicroServiceId,
        delay_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<Instance> {
        let ecosystem = self.store.load().await?;
        let service = ecosystem
            .find_microservice(service_id)
            .ok_or_else(|| TrampolineError::MicroserviceNotFound(service_id.to_string()))?;
        let port = self.ports.reserve_from(service.default_port, &ecosystem)?;
        let vm_arguments = service.vm_arguments().to_string();
        let app_arguments = service.app_arguments().to_string();

        let started = self
            .start_instance_cancellable(
                service_id,
                port,
                &vm_arguments,
                &app_arguments,
                delay_secs,
                cancel,
            )
            .await;
        self.ports.release(port);
        started
    }

    /// Stop the instance's service and, when `clear` is set, forget the instance.
    ///
    /// The stop command is dispatched without waiting for the process to exit.
    /// The document is saved even when nothing was removed.
    pub async fn kill_instance(&self, instance_id: &InstanceId, clear: bool) -> Result<()> {
        let ecosystem = self.store.load().await?;
        let instance = ecosystem
            .find_instance(instance_id)
            .ok_or_else(|| TrampolineError::InstanceNotFound(instance_id.to_string()))?;

        if let Some(service_id) = instance.microservice_id() {
            if let Some(stop) = self.scripts.stop_invocation(service_id) {
                runner::dispatch(&stop)?;
            }
            let dropped = self.registry.remove_service(service_id);
            info!(service = %service_id, handles = dropped, "stop dispatched");
        }

        let id = instance_id.clone();
        self.store
            .update(move |ecosystem| {
                if clear {
                    ecosystem.remove_instance(&id);
                }
                Ok(())
            })
            .await?;
        info!(instance = %instance_id, clear, "instance killed");
        Ok(())
    }

    /// Kill the instance without clearing it, then start its service again
    /// with the same port and arguments.
    ///
    /// The original record stays in the document next to the new one.
    pub async fn restart_instance(&self, instance_id: &InstanceId) -> Result<Option<Instance>> {
        let ecosystem = self.store.load().await?;
        let Some(instance) = ecosystem.find_instance(instance_id).cloned() else {
            warn!(instance = %instance_id, "restart requested for unknown instance");
            return Ok(None);
        };
        let service_id = instance.microservice_id().cloned().ok_or_else(|| {
            let owner = instance.owner.as_ref().map(|o| o.raw_id()).unwrap_or_default();
            TrampolineError::MicroserviceNotFound(owner.to_string())
        })?;

        self.kill_instance(instance_id, false).await?;
        let restarted = self
            .start_instance(
                &service_id,
                instance.port,
                &instance.vm_arguments,
                &instance.app_arguments,
                0,
            )
            .await?;
        Ok(Some(restarted))
    }

    /// Adopt a registered external endpoint as an instance. Nothing is spawned.
    pub async fn add_external_instance(&self, external_id: &ExternalInstanceId) -> Result<Instance> {
        let instance = self
            .store
            .update(|ecosystem| {
                let external = ecosystem.find_external_instance(external_id).ok_or_else(|| {
                    TrampolineError::ExternalInstanceNotFound(external_id.to_string())
                })?;
                let instance = Instance::adopted(external);
                ecosystem.instances.push(instance.clone());
                Ok(instance)
            })
            .await?;
        info!(instance = %instance.id, external = %external_id, "external instance adopted");
        Ok(instance)
    }

    /// Probe the instance's actuator. Unknown ids are reported as not deployed.
    pub async fn get_status_instance(&self, instance_id: &InstanceId) -> Result<InstanceStatus> {
        let ecosystem = self.store.load().await?;
        let Some(instance) = ecosystem.find_instance(instance_id) else {
            return Ok(InstanceStatus::NotDeployed);
        };
        Ok(health::probe(&self.http, &instance.health_url()).await)
    }

    pub async fn check_port(&self, port: u16) -> Result<bool> {
        let ecosystem = self.store.load().await?;
        Ok(self.ports.is_available(port, &ecosystem))
    }
}
