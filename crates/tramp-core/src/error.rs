#[derive(Debug, thiserror::Error)]
pub enum TrampolineError {
    #[error("could not create settings folder: {0}")]
    SettingsFolderCreation(String),

    #[error("could not read ecosystem: {0}")]
    EcosystemRead(String),

    #[error("could not save ecosystem: {0}")]
    EcosystemWrite(String),

    #[error("could not create launch script: {0}")]
    ScriptCreation(String),

    #[error("could not run launch script: {0}")]
    ScriptExecution(String),

    #[error("could not dispatch stop command: {0}")]
    Shutdown(String),

    #[error("instance '{0}' not found")]
    InstanceNotFound(String),

    #[error("microservice '{0}' not found")]
    MicroserviceNotFound(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("external instance '{0}' not found")]
    ExternalInstanceNotFound(String),

    #[error("startup delay was interrupted")]
    InterruptedWait,

    #[error("invalid group: {0}")]
    InvalidGroup(String),

    #[error("invalid microservice: {0}")]
    InvalidMicroservice(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("no free port found at or above {0}")]
    PortsExhausted(u16),

    #[error("health client setup failed: {0}")]
    HealthCheck(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TrampolineError>;
