use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, TrampolineError};
use crate::models::{BuildTool, Ecosystem, MicroService, MicroServiceId, Settings};

const MAVEN_UNIX: &str = include_str!("../../templates/maven-unix.sh");
const GRADLE_UNIX: &str = include_str!("../../templates/gradle-unix.sh");
const MAVEN_WINDOWS: &str = include_str!("../../templates/maven-windows.txt");
const GRADLE_WINDOWS: &str = include_str!("../../templates/gradle-windows.txt");

/// Which family of launch artifact the host uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Parameterized `sh` script taking a `start`/`stop` verb.
    Unix,
    /// One-shot command file run in a new console; no stop verb.
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn artifact_extension(self) -> &'static str {
        match self {
            Self::Unix => "sh",
            Self::Windows => "txt",
        }
    }

    fn template_name(self, tool: BuildTool) -> &'static str {
        match (self, tool) {
            (Self::Unix, BuildTool::Maven) => "maven-unix.sh",
            (Self::Unix, BuildTool::Gradle) => "gradle-unix.sh",
            (Self::Windows, BuildTool::Maven) => "maven-windows.txt",
            (Self::Windows, BuildTool::Gradle) => "gradle-windows.txt",
        }
    }

    fn builtin_template(self, tool: BuildTool) -> &'static str {
        match (self, tool) {
            (Self::Unix, BuildTool::Maven) => MAVEN_UNIX,
            (Self::Unix, BuildTool::Gradle) => GRADLE_UNIX,
            (Self::Windows, BuildTool::Maven) => MAVEN_WINDOWS,
            (Self::Windows, BuildTool::Gradle) => GRADLE_WINDOWS,
        }
    }
}

/// A fully materialized process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

/// Materializes launch artifacts and the commands that run them.
#[derive(Debug, Clone)]
pub struct LaunchCommandBuilder {
    scripts_dir: PathBuf,
    templates_dir: Option<PathBuf>,
    platform: Platform,
}

impl LaunchCommandBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            scripts_dir: settings.settings_folder.clone(),
            templates_dir: settings.templates_dir.clone(),
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// `<scripts dir>/<microservice id>.sh` (or `.txt` for command files).
    pub fn artifact_path(&self, id: &MicroServiceId) -> PathBuf {
        self.scripts_dir
            .join(format!("{id}.{}", self.platform.artifact_extension()))
    }

    fn pid_file(&self, id: &MicroServiceId) -> PathBuf {
        self.scripts_dir.join(format!("{id}.pids"))
    }

    async fn template(&self, tool: BuildTool) -> Result<String> {
        let Some(dir) = &self.templates_dir else {
            return Ok(self.platform.builtin_template(tool).to_string());
        };
        let path = dir.join(self.platform.template_name(tool));
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            TrampolineError::ScriptCreation(format!(
                "reading template {}: {e}",
                path.display()
            ))
        })
    }

    /// Artifact content for `service`, with the definition-time placeholders filled.
    pub async fn render_artifact(&self, service: &MicroService) -> Result<String> {
        let template = self.template(service.build_tool()).await?;
        let pid_file = self.pid_file(&service.id);
        let pid_file = pid_file.to_string_lossy();
        let log_dir = self.scripts_dir.to_string_lossy();
        let content = match self.platform {
            Platform::Unix => {
                let id = shell_quote(service.id.as_str());
                let name = shell_quote(&service.name);
                let source = shell_quote(&service.source_location);
                let pid_file = shell_quote(&pid_file);
                let log_dir = shell_quote(&log_dir);
                render(
                    &template,
                    &[
                        ("SERVICE_ID", id.as_str()),
                        ("SERVICE_NAME", name.as_str()),
                        ("SOURCE_LOCATION", source.as_str()),
                        ("PID_FILE", pid_file.as_str()),
                        ("LOG_DIR", log_dir.as_str()),
                    ],
                )
            }
            Platform::Windows => render(
                template.trim_end(),
                &[("SOURCE_LOCATION", service.source_location.as_str())],
            ),
        };
        Ok(content)
    }

    /// Replace the artifact for `service` with a freshly rendered one.
    pub async fn write_artifact(&self, service: &MicroService) -> Result<PathBuf> {
        info!(microservice = %service.id, "creating launch script");
        let content = self.render_artifact(service).await?;
        let path = self.artifact_path(&service.id);
        self.remove_artifact(&service.id).await?;
        tokio::fs::write(&path, content).await.map_err(|e| {
            TrampolineError::ScriptCreation(format!("writing {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    pub async fn remove_artifact(&self, id: &MicroServiceId) -> Result<()> {
        let path = self.artifact_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrampolineError::ScriptCreation(format!(
                "removing {}: {e}",
                path.display()
            ))),
        }
    }

    /// The command that starts `service` on `port`.
    pub async fn start_invocation(
        &self,
        service: &MicroService,
        ecosystem: &Ecosystem,
        port: u16,
        vm_arguments: &str,
        app_arguments: &str,
    ) -> Result<Invocation> {
        let artifact = self.artifact_path(&service.id);
        match self.platform {
            Platform::Unix => {
                let mut envs = Vec::new();
                if let Some(home) = ecosystem.maven_home_location.as_deref() {
                    envs.push(("M2_HOME".to_string(), home.to_string()));
                }
                if let Some(binary) = ecosystem.maven_binary_dir() {
                    envs.push(("MAVEN_BINARY_DIR".to_string(), binary));
                }
                if service.build_tool() == BuildTool::Gradle {
                    envs.extend(env_assignments(vm_arguments));
                }
                Ok(Invocation {
                    program: "sh".to_string(),
                    args: vec![
                        artifact.to_string_lossy().to_string(),
                        "start".to_string(),
                        port.to_string(),
                        vm_arguments.to_string(),
                        app_arguments.to_string(),
                    ],
                    envs,
                })
            }
            Platform::Windows => {
                let commands = tokio::fs::read_to_string(&artifact).await.map_err(|e| {
                    TrampolineError::ScriptExecution(format!(
                        "reading {}: {e}",
                        artifact.display()
                    ))
                })?;
                let commands =
                    self.fill_command_file(&commands, service, ecosystem, port, vm_arguments);
                Ok(Invocation {
                    program: "cmd".to_string(),
                    args: vec![
                        "/c".to_string(),
                        "start".to_string(),
                        "cmd.exe".to_string(),
                        "/K".to_string(),
                        commands,
                    ],
                    envs: Vec::new(),
                })
            }
        }
    }

    /// Fill the start-time placeholders of a command file.
    pub fn fill_command_file(
        &self,
        commands: &str,
        service: &MicroService,
        ecosystem: &Ecosystem,
        port: u16,
        vm_arguments: &str,
    ) -> String {
        let port = port.to_string();
        let home = ecosystem.maven_home_location.clone().unwrap_or_default();
        let binary = ecosystem.maven_binary_dir().unwrap_or_default();
        let vm = match service.build_tool() {
            BuildTool::Maven => vm_arguments.to_string(),
            BuildTool::Gradle => env_assignments(vm_arguments)
                .into_iter()
                .map(|(key, value)| format!("SET {key}={value}&& "))
                .collect(),
        };
        render(
            commands.trim_end(),
            &[
                ("PORT", port.as_str()),
                ("MAVEN_HOME_LOCATION", home.as_str()),
                ("MAVEN_BINARY_LOCATION", binary.as_str()),
                ("VM_ARGUMENTS", vm.as_str()),
            ],
        )
    }

    /// The script's `stop` verb, if this platform has one and the script exists.
    pub fn stop_invocation(&self, id: &MicroServiceId) -> Option<Invocation> {
        if self.platform == Platform::Windows {
            return None;
        }
        let artifact = self.artifact_path(id);
        if !artifact.exists() {
            warn!(script = %artifact.display(), "stop script does not exist");
            return None;
        }
        Some(Invocation {
            program: "sh".to_string(),
            args: vec![artifact.to_string_lossy().to_string(), "stop".to_string()],
            envs: Vec::new(),
        })
    }

    /// Gradle projects are started through their wrapper, which must be executable.
    pub fn prepare_source(&self, service: &MicroService) {
        if self.platform != Platform::Unix || service.build_tool() != BuildTool::Gradle {
            return;
        }
        let wrapper = Path::new(&service.source_location).join("gradlew");
        if let Err(e) = make_executable(&wrapper) {
            warn!(wrapper = %wrapper.display(), "could not mark gradle wrapper executable: {e}");
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Substitute `#NAME` placeholders in a single pass.
///
/// Unknown `#` sequences are copied through untouched, and substituted
/// values are never rescanned. When several names match at one position
/// the longest wins.
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let matched = params
            .iter()
            .filter(|(name, _)| tail.starts_with(name))
            .max_by_key(|(name, _)| name.len());
        match matched {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('#');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Quote `value` as one `sh` word. Nothing inside single quotes is
/// expanded, so only the quote itself needs escaping.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Translate `-Dsome.property=value` VM arguments into environment
/// assignments (`SOME_PROPERTY=value`), the form gradle's bootRun reads.
/// Tokens that are not system properties are dropped.
pub fn env_assignments(vm_arguments: &str) -> Vec<(String, String)> {
    vm_arguments
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("-D"))
        .filter_map(|property| {
            let (key, value) = property.split_once('=').unwrap_or((property, "true"));
            if key.is_empty() {
                return None;
            }
            let key = key
                .chars()
                .map(|c| match c {
                    '.' | '-' => '_',
                    other => other.to_ascii_uppercase(),
                })
                .collect();
            Some((key, value.to_string()))
        })
        .collect()
}
