pub mod config;
pub mod ecosystem;
pub mod group;
pub mod ids;
pub mod instance;
pub mod microservice;

pub use config::Settings;
pub use ecosystem::{Ecosystem, GitCredentials, HttpsSettings, SshSettings};
pub use group::MicroservicesGroup;
pub use ids::{ExternalInstanceId, GroupId, InstanceId, MicroServiceId};
pub use instance::{ExternalInstance, Instance, InstanceOwner, InstanceStatus};
pub use microservice::{BuildTool, CreateMicroService, MicroService, ServiceDefinition};
