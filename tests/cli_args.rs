// tests/cli_args.rs

use clap::Parser;

use dockhand::cli::CliArgs;
use dockhand::types::CleanupPolicy;

fn parse(args: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("dockhand").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn defaults_clean_up_and_propagate_proxies() {
    let args = parse(&["test"]);
    let options = args.run_options();

    assert_eq!(args.config, "dockhand.toml");
    assert_eq!(options.task_name, "test");
    assert!(options.additional_arguments.is_empty());
    assert_eq!(options.behaviour_after_success, CleanupPolicy::Cleanup);
    assert_eq!(options.behaviour_after_failure, CleanupPolicy::Cleanup);
    assert!(options.propagate_proxy_environment_variables);
    assert_eq!(options.max_parallelism, None);
    assert!(!args.dry_run);
    assert!(!args.skip_prerequisites);
}

#[test]
fn prerequisites_can_be_skipped() {
    let args = parse(&["--skip-prerequisites", "test"]);
    assert!(args.skip_prerequisites);
    assert_eq!(args.run_options().task_name, "test");
}

#[test]
fn arguments_after_double_dash_go_to_the_main_container() {
    let options =
        parse(&["-f", "ci/dockhand.toml", "test", "--", "--nocapture", "-v"]).run_options();

    assert_eq!(options.task_name, "test");
    assert_eq!(options.additional_arguments, vec!["--nocapture", "-v"]);
}

#[test]
fn cleanup_flags_select_the_policy_per_outcome() {
    let options = parse(&["--no-cleanup-after-failure", "test"]).run_options();
    assert_eq!(options.behaviour_after_success, CleanupPolicy::Cleanup);
    assert_eq!(options.behaviour_after_failure, CleanupPolicy::DontCleanup);

    let options = parse(&["--no-cleanup-after-success", "test"]).run_options();
    assert_eq!(options.behaviour_after_success, CleanupPolicy::DontCleanup);
    assert_eq!(options.behaviour_after_failure, CleanupPolicy::Cleanup);

    let options = parse(&["--no-cleanup", "test"]).run_options();
    assert_eq!(options.behaviour_after_success, CleanupPolicy::DontCleanup);
    assert_eq!(options.behaviour_after_failure, CleanupPolicy::DontCleanup);
}

#[test]
fn proxy_propagation_can_be_disabled() {
    let options = parse(&["--no-proxy-vars", "test"]).run_options();
    assert!(!options.propagate_proxy_environment_variables);
}

#[test]
fn max_parallelism_must_be_positive() {
    assert_eq!(
        parse(&["--max-parallelism", "4", "test"]).run_options().max_parallelism,
        Some(4)
    );
    assert!(CliArgs::try_parse_from(["dockhand", "--max-parallelism", "0", "test"]).is_err());
}

#[test]
fn task_is_required() {
    assert!(CliArgs::try_parse_from(["dockhand"]).is_err());
}
