mod common;

use tramp_core::models::{BuildTool, CreateMicroService, Ecosystem, MicroService, ServiceDefinition};
use tramp_core::services::launch::{LaunchCommandBuilder, Platform};

use common::TestEnv;

fn windows_builder(env: &TestEnv) -> LaunchCommandBuilder {
    LaunchCommandBuilder::new(&env.settings).with_platform(Platform::Windows)
}

fn ecosystem() -> Ecosystem {
    Ecosystem {
        maven_home_location: Some("C:/tools/maven".into()),
        ..Ecosystem::default()
    }
}

async fn console_command(
    builder: &LaunchCommandBuilder,
    service: &MicroService,
    port: u16,
    vm_arguments: &str,
) -> String {
    std::fs::create_dir_all(builder.artifact_path(&service.id).parent().unwrap()).unwrap();
    builder.write_artifact(service).await.unwrap();
    let invocation = builder
        .start_invocation(service, &ecosystem(), port, vm_arguments, "")
        .await
        .unwrap();
    assert_eq!(invocation.program, "cmd");
    assert_eq!(&invocation.args[..4], ["/c", "start", "cmd.exe", "/K"]);
    invocation.args[4].clone()
}

#[tokio::test]
async fn maven_command_file() {
    let env = TestEnv::new();
    let builder = windows_builder(&env);
    let service = MicroService::from_create(
        CreateMicroService::new("orders", ServiceDefinition::new("C:/svc/orders", 8081)),
        1.0,
    );

    let command = console_command(&builder, &service, 8081, "-Xmx256m").await;
    insta::assert_snapshot!(command, @"SET M2_HOME=C:/tools/maven&& SET PATH=%PATH%;C:/tools/maven/bin&& cd C:/svc/orders && mvn spring-boot:run -Dserver.port=8081 -Dmanagement.endpoints.web.exposure.include=* -Dmanagement.endpoint.shutdown.enabled=true -Xmx256m");
}

#[tokio::test]
async fn gradle_command_file() {
    let env = TestEnv::new();
    let builder = windows_builder(&env);
    let mut definition = ServiceDefinition::new("C:/svc/billing", 8082);
    definition.build_tool = Some(BuildTool::Gradle);
    let service = MicroService::from_create(CreateMicroService::new("billing", definition), 1.0);

    let command =
        console_command(&builder, &service, 8082, "-Dspring.profiles.active=dev").await;
    insta::assert_snapshot!(command, @"SET SERVER_PORT=8082&& SET MANAGEMENT_ENDPOINTS_WEB_EXPOSURE_INCLUDE=*&& SET MANAGEMENT_ENDPOINT_SHUTDOWN_ENABLED=true&& SET SPRING_PROFILES_ACTIVE=dev&& cd C:/svc/billing && gradlew.bat bootRun");
}

#[tokio::test]
async fn command_files_have_no_stop_verb() {
    let env = TestEnv::new();
    let builder = windows_builder(&env);
    let service = MicroService::from_create(
        CreateMicroService::new("orders", ServiceDefinition::new("C:/svc/orders", 8081)),
        1.0,
    );
    console_command(&builder, &service, 8081, "").await;
    assert!(builder.stop_invocation(&service.id).is_none());
}
