use clap::{Args, Subcommand};
use color_eyre::eyre::eyre;

use tramp_core::models::{
    BuildTool, CreateMicroService, ExternalInstanceId, GroupId, InstanceId, MicroServiceId,
    ServiceDefinition,
};
use tramp_core::services::scheduler::GroupProgress;
use tramp_core::services::Orchestrator;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the whole ecosystem document.
    Show,
    #[command(subcommand, about = "Manage the microservice catalog")]
    Service(ServiceCommand),
    #[command(subcommand, about = "Start, stop and inspect instances")]
    Instance(InstanceCommand),
    #[command(subcommand, about = "Manage manually registered endpoints")]
    External(ExternalCommand),
    #[command(subcommand, about = "Manage and start groups")]
    Group(GroupCommand),
    /// Whether a port is free for a new instance.
    CheckPort { port: u16 },
    #[command(subcommand, about = "Build tool locations")]
    Maven(MavenCommand),
    #[command(subcommand, about = "Source-control credentials")]
    Credentials(CredentialsCommand),
}

#[derive(Debug, Args)]
pub struct DefinitionArgs {
    #[arg(long)]
    source: String,
    #[arg(long)]
    port: u16,
    #[arg(long, default_value = "/actuator")]
    actuator_prefix: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    vm_args: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    app_args: String,
    #[arg(long)]
    git: Option<String>,
    /// MAVEN or GRADLE.
    #[arg(long)]
    build_tool: Option<BuildTool>,
}

impl From<DefinitionArgs> for ServiceDefinition {
    fn from(args: DefinitionArgs) -> Self {
        Self {
            source_location: args.source,
            default_port: args.port,
            actuator_prefix: args.actuator_prefix,
            vm_arguments: args.vm_args,
            app_arguments: args.app_args,
            git_location: args.git,
            build_tool: args.build_tool,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    Add {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        definition: DefinitionArgs,
    },
    Update {
        id: String,
        #[command(flatten)]
        definition: DefinitionArgs,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommand {
    Start {
        service_id: String,
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        vm_args: String,
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        app_args: String,
        /// Seconds to wait before launching.
        #[arg(long, default_value_t = 0)]
        delay: u64,
    },
    Kill {
        id: String,
        /// Also remove the instance from the ecosystem.
        #[arg(long)]
        clear: bool,
    },
    Restart {
        id: String,
    },
    Status {
        id: String,
    },
    /// Turn a registered external endpoint into an instance.
    Adopt {
        external_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExternalCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
        #[arg(long, default_value = "/actuator")]
        actuator_prefix: String,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    Add {
        #[arg(long)]
        name: String,
        /// `<microservice-id>[:<delay-seconds>]`, in start order.
        #[arg(long = "member", value_parser = parse_member, required = true)]
        members: Vec<(String, u64)>,
    },
    Remove {
        id: String,
    },
    /// Start every member; Ctrl-C cancels the pending ones.
    Start {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum MavenCommand {
    Home { path: String },
    Binary { path: String },
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    Https {
        #[arg(long)]
        user: String,
        #[arg(long)]
        pass: String,
    },
    Ssh {
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    Clean,
}

fn parse_member(raw: &str) -> Result<(String, u64), String> {
    match raw.split_once(':') {
        None => Ok((raw.to_string(), 0)),
        Some((id, delay)) => delay
            .parse()
            .map(|delay| (id.to_string(), delay))
            .map_err(|e| format!("invalid delay '{delay}': {e}")),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(orchestrator: &Orchestrator, command: Command) -> color_eyre::Result<()> {
    let catalog = &orchestrator.catalog;
    let lifecycle = &orchestrator.lifecycle;
    match command {
        Command::Show => print_json(&catalog.ecosystem().await?)?,
        Command::Service(ServiceCommand::Add { name, definition }) => {
            let id = catalog
                .set_new_microservice(CreateMicroService::new(name, definition.into()))
                .await?;
            println!("{id}");
        }
        Command::Service(ServiceCommand::Update { id, definition }) => {
            let updated = catalog
                .update_microservice(&MicroServiceId::from(id), definition.into())
                .await?;
            print_json(&updated)?;
        }
        Command::Service(ServiceCommand::Remove { id }) => {
            catalog.remove_microservice(&MicroServiceId::from(id)).await?;
        }
        Command::Instance(InstanceCommand::Start {
            service_id,
            port,
            vm_args,
            app_args,
            delay,
        }) => {
            let instance = lifecycle
                .start_instance(&MicroServiceId::from(service_id), port, &vm_args, &app_args, delay)
                .await?;
            print_json(&instance)?;
        }
        Command::Instance(InstanceCommand::Kill { id, clear }) => {
            lifecycle.kill_instance(&InstanceId::from(id), clear).await?;
        }
        Command::Instance(InstanceCommand::Restart { id }) => {
            match lifecycle.restart_instance(&InstanceId::from(id.as_str())).await? {
                Some(instance) => print_json(&instance)?,
                None => return Err(eyre!("instance '{id}' not found")),
            }
        }
        Command::Instance(InstanceCommand::Status { id }) => {
            let status = lifecycle.get_status_instance(&InstanceId::from(id)).await?;
            println!("{}", status.code());
        }
        Command::Instance(InstanceCommand::Adopt { external_id }) => {
            let instance = lifecycle
                .add_external_instance(&ExternalInstanceId::from(external_id))
                .await?;
            print_json(&instance)?;
        }
        Command::External(ExternalCommand::Add {
            name,
            port,
            ip,
            actuator_prefix,
        }) => {
            let id = catalog
                .set_new_external_instance(&name, port, &actuator_prefix, &ip)
                .await?;
            println!("{id}");
        }
        Command::External(ExternalCommand::Remove { id }) => {
            catalog
                .remove_external_instance(&ExternalInstanceId::from(id))
                .await?;
        }
        Command::Group(GroupCommand::Add { name, members }) => {
            let (ids, delays): (Vec<_>, Vec<_>) = members
                .into_iter()
                .map(|(id, delay)| (MicroServiceId::from(id), delay))
                .unzip();
            let id = catalog.set_microservice_group(&name, ids, delays).await?;
            println!("{id}");
        }
        Command::Group(GroupCommand::Remove { id }) => {
            catalog.remove_group(&GroupId::from(id)).await?;
        }
        Command::Group(GroupCommand::Start { id }) => start_group(orchestrator, GroupId::from(id)).await?,
        Command::CheckPort { port } => {
            let available = lifecycle.check_port(port).await?;
            println!("{available}");
        }
        Command::Maven(MavenCommand::Home { path }) => catalog.set_maven_home_location(&path).await?,
        Command::Maven(MavenCommand::Binary { path }) => {
            catalog.set_maven_binary_location(&path).await?
        }
        Command::Credentials(CredentialsCommand::Https { user, pass }) => {
            catalog.save_git_https_cred(&user, &pass).await?
        }
        Command::Credentials(CredentialsCommand::Ssh { key, password }) => {
            catalog.save_git_ssh_cred(&key, &password).await?
        }
        Command::Credentials(CredentialsCommand::Clean) => catalog.clean_git_cred().await?,
    }
    Ok(())
}

async fn start_group(orchestrator: &Orchestrator, id: GroupId) -> color_eyre::Result<()> {
    let mut launch = orchestrator.groups.launch_group(&id).await?;
    let cancel = launch.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(progress) = launch.next_progress().await {
        match progress {
            GroupProgress::Waiting {
                index,
                total,
                service,
                delay_secs,
            } => eprintln!("[{}/{total}] {service}: waiting {delay_secs}s", index + 1),
            GroupProgress::Started {
                index,
                total,
                instance,
            } => eprintln!(
                "[{}/{total}] {} started on port {}",
                index + 1,
                instance.name,
                instance.port
            ),
        }
    }
    let started = launch.wait().await?;
    print_json(&started)?;
    Ok(())
}
