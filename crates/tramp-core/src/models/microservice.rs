use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::ids::MicroServiceId;
use crate::error::{Result, TrampolineError};

pub const DEFAULT_ACTUATOR_PREFIX: &str = "/actuator";

const MIN_DEFAULT_PORT: u16 = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildTool {
    #[default]
    Maven,
    Gradle,
}

impl BuildTool {
    /// Parse a build tool name coming from a document or user input.
    ///
    /// Matching is case-insensitive. Anything unrecognised falls back to
    /// [`BuildTool::Maven`]; this is the only place that fallback happens.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for BuildTool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAVEN" => Ok(Self::Maven),
            "GRADLE" => Ok(Self::Gradle),
            other => Err(format!("unknown build tool '{other}'")),
        }
    }
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maven => f.write_str("MAVEN"),
            Self::Gradle => f.write_str("GRADLE"),
        }
    }
}

fn lenient_build_tool<'de, D>(deserializer: D) -> std::result::Result<Option<BuildTool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|r| BuildTool::parse_lenient(&r)))
}

/// A catalog entry describing how to build and launch a service.
///
/// The optional fields model documents written by older versions; the
/// store's upgrade pass fills them in on load, after which the accessors
/// never have to fall back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroService {
    pub id: MicroServiceId,
    pub name: String,
    pub source_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_location: Option<String>,
    pub default_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuator_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_arguments: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_build_tool",
        skip_serializing_if = "Option::is_none"
    )]
    pub build_tool: Option<BuildTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f32>,
}

impl MicroService {
    pub fn from_create(create: CreateMicroService, version: f32) -> Self {
        let mut service = Self {
            id: MicroServiceId::generate(),
            name: create.name,
            source_location: String::new(),
            git_location: None,
            default_port: 0,
            actuator_prefix: None,
            vm_arguments: None,
            app_arguments: None,
            build_tool: None,
            version: Some(version),
        };
        service.apply(create.definition);
        service
    }

    /// Overwrite every editable field with the values from `definition`.
    pub fn apply(&mut self, definition: ServiceDefinition) {
        self.source_location = definition.source_location;
        self.git_location = definition.git_location;
        self.default_port = definition.default_port;
        self.actuator_prefix = Some(definition.actuator_prefix);
        self.vm_arguments = Some(definition.vm_arguments);
        self.app_arguments = Some(definition.app_arguments);
        self.build_tool = Some(definition.build_tool.unwrap_or_default());
    }

    pub fn build_tool(&self) -> BuildTool {
        self.build_tool.unwrap_or_default()
    }

    pub fn actuator_prefix(&self) -> &str {
        self.actuator_prefix.as_deref().unwrap_or_default()
    }

    pub fn vm_arguments(&self) -> &str {
        self.vm_arguments.as_deref().unwrap_or_default()
    }

    pub fn app_arguments(&self) -> &str {
        self.app_arguments.as_deref().unwrap_or_default()
    }
}

/// Editable fields of a catalog entry.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub source_location: String,
    pub default_port: u16,
    pub actuator_prefix: String,
    pub vm_arguments: String,
    pub app_arguments: String,
    pub git_location: Option<String>,
    pub build_tool: Option<BuildTool>,
}

impl ServiceDefinition {
    pub fn new(source_location: impl Into<String>, default_port: u16) -> Self {
        Self {
            source_location: source_location.into(),
            default_port,
            actuator_prefix: DEFAULT_ACTUATOR_PREFIX.to_string(),
            vm_arguments: String::new(),
            app_arguments: String::new(),
            git_location: None,
            build_tool: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_location.trim().is_empty() {
            return Err(TrampolineError::InvalidMicroservice(
                "source location is required".into(),
            ));
        }
        if self.default_port < MIN_DEFAULT_PORT {
            return Err(TrampolineError::InvalidMicroservice(format!(
                "default port {} is below {MIN_DEFAULT_PORT}",
                self.default_port
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreateMicroService {
    pub name: String,
    pub definition: ServiceDefinition,
}

impl CreateMicroService {
    pub fn new(name: impl Into<String>, definition: ServiceDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TrampolineError::InvalidMicroservice(
                "name is required".into(),
            ));
        }
        self.definition.validate()
    }
}
