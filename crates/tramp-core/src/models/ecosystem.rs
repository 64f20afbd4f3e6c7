use serde::{Deserialize, Serialize};

use super::group::MicroservicesGroup;
use super::ids::{ExternalInstanceId, GroupId, InstanceId, MicroServiceId};
use super::instance::{ExternalInstance, Instance};
use super::microservice::MicroService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsSettings {
    pub username: String,
    pub pass: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshSettings {
    pub ssh_key_location: String,
    pub ssh_key_password: String,
}

/// Source-control credentials, stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_settings: Option<HttpsSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_settings: Option<SshSettings>,
}

/// The whole managed environment, persisted as a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ecosystem {
    #[serde(default)]
    pub git_credentials: GitCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_binary_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_home_location: Option<String>,
    #[serde(default)]
    pub microservices: Vec<MicroService>,
    #[serde(default)]
    pub external_instances: Vec<ExternalInstance>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub microservices_groups: Vec<MicroservicesGroup>,
}

impl Ecosystem {
    pub fn find_microservice(&self, id: &MicroServiceId) -> Option<&MicroService> {
        self.microservices.iter().find(|m| &m.id == id)
    }

    pub fn find_instance(&self, id: &InstanceId) -> Option<&Instance> {
        self.instances.iter().find(|i| &i.id == id)
    }

    pub fn find_external_instance(&self, id: &ExternalInstanceId) -> Option<&ExternalInstance> {
        self.external_instances.iter().find(|e| &e.id == id)
    }

    pub fn find_group(&self, id: &GroupId) -> Option<&MicroservicesGroup> {
        self.microservices_groups.iter().find(|g| &g.id == id)
    }

    /// Whether any declared instance claims `port`, on any ip.
    pub fn declares_port(&self, port: u16) -> bool {
        self.instances.iter().any(|i| i.port == port)
    }

    pub fn remove_instance(&mut self, id: &InstanceId) -> bool {
        let before = self.instances.len();
        self.instances.retain(|i| &i.id != id);
        self.instances.len() != before
    }

    /// Remove a catalog entry and prune it from every group.
    pub fn remove_microservice(&mut self, id: &MicroServiceId) -> bool {
        let before = self.microservices.len();
        self.microservices.retain(|m| &m.id != id);
        for group in &mut self.microservices_groups {
            group.remove_member(id);
        }
        self.microservices.len() != before
    }

    pub fn remove_group(&mut self, id: &GroupId) -> bool {
        let before = self.microservices_groups.len();
        self.microservices_groups.retain(|g| &g.id != id);
        self.microservices_groups.len() != before
    }

    pub fn remove_external_instance(&mut self, id: &ExternalInstanceId) -> bool {
        let before = self.external_instances.len();
        self.external_instances.retain(|e| &e.id != id);
        self.external_instances.len() != before
    }

    /// Directory holding the maven binary: the explicit binary location when
    /// set, otherwise `bin` under the maven home.
    pub fn maven_binary_dir(&self) -> Option<String> {
        match self.maven_binary_location.as_deref() {
            Some(binary) if !binary.trim().is_empty() => Some(binary.to_string()),
            _ => self
                .maven_home_location
                .as_deref()
                .filter(|home| !home.trim().is_empty())
                .map(|home| format!("{home}/bin")),
        }
    }
}
