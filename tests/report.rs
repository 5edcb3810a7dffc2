// tests/report.rs

use std::path::PathBuf;

use dockhand::dag::SetupCommand;
use dockhand::docker::{ContainerHandle, ContainerInspection, HealthCheckResult, Network};
use dockhand::events::TaskEvent;
use dockhand::exec::runners::health::unhealthy_message;
use dockhand::progress::describe;
use dockhand::report::{ManualCleanup, TaskResult, format_failure, format_manual_cleanup};
use dockhand::types::{CleanupPolicy, RunOptions};

const RERUN_HINT: &str = "You can re-run the task with --no-cleanup-after-failure to leave the created containers running to diagnose the issue.";

fn options(after_failure: CleanupPolicy) -> RunOptions {
    let mut options = RunOptions::for_task("test");
    options.behaviour_after_failure = after_failure;
    options
}

#[test]
fn exit_codes_per_result() {
    assert_eq!(TaskResult::Succeeded { exit_code: 7 }.exit_code(), 7);
    assert_eq!(TaskResult::Failed.exit_code(), -1);
    assert_eq!(TaskResult::Cancelled.exit_code(), -2);
}

#[test]
fn failures_have_a_headline_and_body() {
    let event = TaskEvent::ImageBuildFailed {
        container: "app".to_string(),
        message: "Step 3/7 failed".to_string(),
    };

    assert_eq!(
        format_failure(&event, &options(CleanupPolicy::Cleanup)).as_deref(),
        Some("Error: Could not build image for container 'app'.\nStep 3/7 failed")
    );
}

#[test]
fn rerun_hint_only_when_cleanup_would_happen() {
    let event = TaskEvent::ContainerDidNotBecomeHealthy {
        container: "db".to_string(),
        message: "timed out".to_string(),
    };

    let with_cleanup = format_failure(&event, &options(CleanupPolicy::Cleanup)).unwrap();
    assert!(with_cleanup.ends_with(RERUN_HINT));

    let without_cleanup = format_failure(&event, &options(CleanupPolicy::DontCleanup)).unwrap();
    assert_eq!(
        without_cleanup,
        "Error: Container 'db' did not become healthy.\ntimed out"
    );
}

#[test]
fn setup_command_failure_includes_output() {
    let event = TaskEvent::SetupCommandFailed {
        container: "db".to_string(),
        command: SetupCommand {
            command: "migrate up".to_string(),
            working_directory: None,
        },
        exit_code: 3,
        output: "no such table\n\n".to_string(),
    };

    let message = format_failure(&event, &options(CleanupPolicy::DontCleanup)).unwrap();

    assert_eq!(
        message,
        "Error: Setup command 'migrate up' in container 'db' failed.\nThe command exited with code 3 and output:\nno such table"
    );
}

#[test]
fn non_failures_are_not_formatted() {
    let event = TaskEvent::ContainerStarted {
        container: "app".to_string(),
    };
    assert!(format_failure(&event, &options(CleanupPolicy::Cleanup)).is_none());
}

#[test]
fn cleanup_failure_instructions_pluralise() {
    let one = ManualCleanup::DueToCleanupFailure {
        commands: vec!["docker network rm net-1".to_string()],
    };
    let message = format_manual_cleanup(&one, &[]).unwrap();
    assert!(message.contains("run the following command to clean up"));
    assert!(message.ends_with("\ndocker network rm net-1"));

    let two = ManualCleanup::DueToCleanupFailure {
        commands: vec![
            "docker rm --force --volumes app-id".to_string(),
            "rm /tmp/passwd".to_string(),
        ],
    };
    let message = format_manual_cleanup(&two, &[]).unwrap();
    assert!(message.contains("run some or all of the following commands"));
    assert!(message.ends_with("docker rm --force --volumes app-id\nrm /tmp/passwd"));
}

#[test]
fn nothing_to_clean_up_means_no_message() {
    assert!(format_manual_cleanup(&ManualCleanup::NotRequired, &[]).is_none());
    let empty = ManualCleanup::DueToCleanupFailure { commands: vec![] };
    assert!(format_manual_cleanup(&empty, &[]).is_none());
}

#[test]
fn disabled_cleanup_message_lists_each_container() {
    let events = vec![
        TaskEvent::TaskNetworkCreated {
            network: Network::new("net-1"),
        },
        TaskEvent::ContainerCreated {
            container: "db".to_string(),
            handle: ContainerHandle::new("db-id", "shop-db-x"),
        },
        TaskEvent::ContainerStarted {
            container: "db".to_string(),
        },
        TaskEvent::ContainerCreated {
            container: "app".to_string(),
            handle: ContainerHandle::new("app-id", "shop-app-x"),
        },
    ];
    let manual = ManualCleanup::DueToTaskFailureWithCleanupDisabled {
        commands: vec![
            "docker rm --force --volumes app-id".to_string(),
            "docker rm --force --volumes db-id".to_string(),
            "docker network rm net-1".to_string(),
        ],
    };

    let message = format_manual_cleanup(&manual, &events).unwrap();

    assert!(message.starts_with(
        "As the task was run with --no-cleanup-after-failure, the created containers will not be cleaned up."
    ));
    assert!(message.contains("For container 'db', view its output by running 'docker logs shop-db-x', or run a command in the container with 'docker exec -it shop-db-x <command>'."));
    // Never started, so it has to be started first.
    assert!(message.contains("'docker start shop-app-x; docker exec -it shop-app-x <command>'"));
    assert!(message.contains("Once you have finished investigating the issue, clean up"));
    assert!(message.ends_with("docker network rm net-1"));
}

#[test]
fn unhealthy_message_explains_the_last_check() {
    let prefix = "The configured health check did not indicate that the container was healthy within the timeout period.";

    let none = ContainerInspection {
        has_health_check: true,
        health_log: vec![],
    };
    assert_eq!(
        unhealthy_message(&none),
        format!("{prefix} The container has no recorded health check results.")
    );

    let late = ContainerInspection {
        has_health_check: true,
        health_log: vec![HealthCheckResult {
            exit_code: 0,
            output: String::new(),
        }],
    };
    assert!(unhealthy_message(&late).contains("exited with code 0, which usually indicates"));

    let silent = ContainerInspection {
        has_health_check: true,
        health_log: vec![
            HealthCheckResult {
                exit_code: 1,
                output: "first".to_string(),
            },
            HealthCheckResult {
                exit_code: 2,
                output: "  \n".to_string(),
            },
        ],
    };
    assert_eq!(
        unhealthy_message(&silent),
        format!("{prefix} The last health check exited with code 2 but did not produce any output.")
    );
}

#[test]
fn progress_lines_for_state_changes_only() {
    assert_eq!(
        describe(&TaskEvent::RunningContainerExited {
            container: "app".to_string(),
            exit_code: 0,
        })
        .as_deref(),
        Some("app exited with code 0.")
    );
    assert!(
        describe(&TaskEvent::TemporaryFileDeleted {
            path: PathBuf::from("/tmp/passwd"),
        })
        .is_none()
    );
    assert!(
        describe(&TaskEvent::ExecutionFailed {
            message: "boom".to_string(),
        })
        .is_none()
    );
}
