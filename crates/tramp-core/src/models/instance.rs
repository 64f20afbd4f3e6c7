use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ExternalInstanceId, InstanceId, MicroServiceId};
use super::microservice::MicroService;

pub const LOOPBACK_IP: &str = "127.0.0.1";

/// What an instance was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum InstanceOwner {
    MicroService(MicroServiceId),
    External(ExternalInstanceId),
}

impl InstanceOwner {
    pub fn microservice_id(&self) -> Option<&MicroServiceId> {
        match self {
            Self::MicroService(id) => Some(id),
            Self::External(_) => None,
        }
    }

    pub fn raw_id(&self) -> &str {
        match self {
            Self::MicroService(id) => id.as_str(),
            Self::External(id) => id.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub name: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<String>,
    #[serde(default)]
    pub actuator_prefix: String,
    #[serde(default)]
    pub vm_arguments: String,
    #[serde(default)]
    pub app_arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<InstanceOwner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// Record for a process this system just spawned.
    pub fn launched(
        id: InstanceId,
        service: &MicroService,
        port: u16,
        vm_arguments: &str,
        app_arguments: &str,
    ) -> Self {
        Self {
            id,
            ip: Some(LOOPBACK_IP.to_string()),
            name: service.name.clone(),
            port,
            source_location: Some(service.source_location.clone()),
            actuator_prefix: service.actuator_prefix().to_string(),
            vm_arguments: vm_arguments.to_string(),
            app_arguments: app_arguments.to_string(),
            owner: Some(InstanceOwner::MicroService(service.id.clone())),
            started_at: Some(Utc::now()),
        }
    }

    /// Record adopting an endpoint that was registered by hand.
    pub fn adopted(external: &ExternalInstance) -> Self {
        Self {
            id: InstanceId::generate(),
            ip: Some(external.ip.clone()),
            name: external.name.clone(),
            port: external.port,
            source_location: None,
            actuator_prefix: external.actuator_prefix.clone(),
            vm_arguments: String::new(),
            app_arguments: String::new(),
            owner: Some(InstanceOwner::External(external.id.clone())),
            started_at: Some(Utc::now()),
        }
    }

    pub fn ip(&self) -> &str {
        self.ip.as_deref().unwrap_or(LOOPBACK_IP)
    }

    pub fn microservice_id(&self) -> Option<&MicroServiceId> {
        self.owner.as_ref().and_then(InstanceOwner::microservice_id)
    }

    /// Base URL of the actuator endpoints, without a trailing slash.
    pub fn actuator_url(&self) -> String {
        let prefix = self.actuator_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("http://{}:{}", self.ip(), self.port)
        } else {
            format!("http://{}:{}/{prefix}", self.ip(), self.port)
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/env", self.actuator_url())
    }
}

/// An endpoint registered by hand; never spawned by this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInstance {
    pub id: ExternalInstanceId,
    pub name: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub actuator_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Deployed,
    NotDeployed,
}

impl InstanceStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Deployed => "DEPLOYED",
            Self::NotDeployed => "NOT_DEPLOYED",
        }
    }
}
