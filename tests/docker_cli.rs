// tests/docker_cli.rs

use std::collections::BTreeMap;
use std::ffi::OsString;

use dockhand::docker::cli::{create_args, parse_build_progress, parse_inspection};
use dockhand::docker::{
    BuildProgress, ContainerCreationRequest, Image, MountSource, MountSpec, Network,
};

fn request(alias: Option<&str>) -> ContainerCreationRequest {
    ContainerCreationRequest {
        name: "shop-app-x".to_string(),
        image: Image::new("sha256:abc"),
        network: Network::new("net-1"),
        network_alias: alias.map(str::to_string),
        command: vec!["cargo".to_string(), "test".to_string()],
        environment: BTreeMap::from([("RUST_LOG".to_string(), "debug".to_string())]),
        working_directory: Some("/code".to_string()),
        mounts: vec![MountSpec {
            source: MountSource::Volume("dockhand-cache-shop-deps".to_string()),
            container_path: "/deps".to_string(),
            options: None,
        }],
        user: Some("1000:1000".to_string()),
    }
}

fn strings(args: Vec<OsString>) -> Vec<String> {
    args.into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn create_passes_every_request_field() {
    assert_eq!(
        strings(create_args(&request(Some("app")))),
        vec![
            "create",
            "--name",
            "shop-app-x",
            "--network",
            "net-1",
            "--network-alias",
            "app",
            "--env",
            "RUST_LOG=debug",
            "--workdir",
            "/code",
            "--volume",
            "dockhand-cache-shop-deps:/deps",
            "--user",
            "1000:1000",
            "sha256:abc",
            "cargo",
            "test",
        ]
    );
}

#[test]
fn create_without_an_alias_omits_the_flag() {
    let mut helper = request(None);
    helper.network = Network::new("default");

    let args = strings(create_args(&helper));

    assert!(!args.iter().any(|a| a == "--network-alias"));
    assert_eq!(&args[..5], ["create", "--name", "shop-app-x", "--network", "default"]);
}

#[test]
fn build_progress_from_both_builders() {
    assert_eq!(
        parse_build_progress("Step 2/5 : RUN make"),
        Some(BuildProgress {
            step: 2,
            total_steps: 5,
            message: "RUN make".to_string(),
        })
    );
    assert_eq!(
        parse_build_progress("#7 [builder 3/4] COPY . ."),
        Some(BuildProgress {
            step: 3,
            total_steps: 4,
            message: "COPY . .".to_string(),
        })
    );
    assert_eq!(parse_build_progress("Sending build context to Docker daemon"), None);
}

#[test]
fn inspection_reads_health_check_and_log() {
    let json = r#"[{
        "Config": { "Healthcheck": { "Test": ["CMD-SHELL", "pg_isready"] } },
        "State": { "Health": { "Log": [
            { "ExitCode": 1, "Output": "no response" },
            { "ExitCode": 0, "Output": "accepting connections" }
        ] } }
    }]"#;

    let inspection = parse_inspection(json).expect("valid inspection");

    assert!(inspection.has_health_check);
    assert_eq!(inspection.health_log.len(), 2);
    assert_eq!(inspection.health_log[1].exit_code, 0);
}

#[test]
fn disabled_or_missing_health_checks_do_not_count() {
    let none = r#"[{ "Config": { "Healthcheck": { "Test": ["NONE"] } }, "State": {} }]"#;
    assert!(!parse_inspection(none).expect("valid").has_health_check);

    let missing = r#"[{ "Config": {}, "State": {} }]"#;
    assert!(!parse_inspection(missing).expect("valid").has_health_check);

    assert!(parse_inspection("[]").is_err());
}
