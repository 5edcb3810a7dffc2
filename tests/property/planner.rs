// tests/property/planner.rs

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use dockhand::config::ProjectConfig;
use dockhand::dag::ContainerDependencyGraph;
use dockhand::docker::{ContainerHandle, Image, Network};
use dockhand::engine::{CleanupDecision, RunDecision, TaskStateMachine};
use dockhand::events::TaskEvent;
use dockhand::report::TaskResult;
use dockhand::steps::TaskStep;
use dockhand::types::RunOptions;
use dockhand_test_utils::builders::{ContainerConfigBuilder, ProjectConfigBuilder, TaskConfigBuilder};

// Strategy to generate a valid container graph.
// Acyclic by construction: container N only depends on containers 0..N-1.
// The task runs the last container.
fn project_strategy(max_containers: usize) -> impl Strategy<Value = ProjectConfig> {
    (1..=max_containers).prop_flat_map(|count| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..count),
            count,
        )
        .prop_map(move |raw_deps| {
            let mut builder = ProjectConfigBuilder::new("prop");
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let name = format!("c{i}");
                // Some containers share an image reference.
                let mut container = if i % 2 == 0 {
                    ContainerConfigBuilder::image(&format!("img:{}", i % 3))
                } else {
                    ContainerConfigBuilder::build_directory(&name)
                };

                let deps: BTreeSet<usize> = potential
                    .into_iter()
                    .filter(|_| i > 0)
                    .map(|d| d % i.max(1))
                    .collect();
                for dep in deps {
                    container = container.depends_on(&format!("c{dep}"));
                }
                builder = builder.with_container(&name, container.build());
            }
            builder
                .with_task("run", TaskConfigBuilder::run(&format!("c{}", count - 1)).build())
                .build()
        })
    })
}

fn handle(container: &str) -> ContainerHandle {
    ContainerHandle::new(format!("{container}-id"), container)
}

/// What a step posts when it succeeds.
fn success(step: &TaskStep) -> Option<TaskEvent> {
    Some(match step.clone() {
        TaskStep::CreateTaskNetwork => TaskEvent::TaskNetworkCreated {
            network: Network::new("net"),
        },
        TaskStep::InitialiseCaches => TaskEvent::CachesInitialised,
        TaskStep::BuildImage { container, .. } => TaskEvent::ImageBuilt {
            image: Image::new(format!("built-{container}")),
            container,
        },
        TaskStep::PullImage { reference } => TaskEvent::ImagePulled {
            image: Image::new(format!("pulled-{reference}")),
            reference,
        },
        TaskStep::CreateContainer { container, .. } => TaskEvent::ContainerCreated {
            handle: handle(&container),
            container,
        },
        TaskStep::StartContainer { container, .. } => TaskEvent::ContainerStarted { container },
        TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
            TaskEvent::ContainerBecameHealthy { container }
        }
        TaskStep::RunContainerSetupCommands { container, .. } => {
            TaskEvent::ContainerBecameReady { container }
        }
        TaskStep::RunContainer { container, .. } => TaskEvent::RunningContainerExited {
            container,
            exit_code: 0,
        },
        _ => return None,
    })
}

struct Simulation {
    events: Vec<TaskEvent>,
    result: TaskResult,
    dispatched: Vec<TaskStep>,
}

/// Drive the state machine to the end of the run stage, completing every
/// dispatched step. The `fail_at`-th dispatched step fails instead.
fn simulate(
    machine: &TaskStateMachine,
    fail_at: Option<usize>,
) -> Result<Simulation, TestCaseError> {
    let mut events = Vec::new();
    let mut dispatched = Vec::new();

    for _ in 0..1000 {
        let decision = machine.next(&events);
        prop_assert_eq!(&decision, &machine.next(&events), "decisions must be deterministic");

        match decision {
            RunDecision::Finished(result) => {
                return Ok(Simulation {
                    events,
                    result,
                    dispatched,
                });
            }
            RunDecision::Stalled => {
                return Err(TestCaseError::fail(format!("stalled after {events:#?}")));
            }
            RunDecision::Dispatch(steps) => {
                if let Some(limit) = machine.options().max_parallelism {
                    prop_assert!(steps.len() <= limit);
                }
                for step in steps.iter() {
                    events.push(TaskEvent::StepStarting { step: step.clone() });
                }
                for step in steps {
                    prop_assert!(!dispatched.contains(&step), "{} dispatched twice", step);
                    let event = if fail_at == Some(dispatched.len()) {
                        TaskEvent::ExecutionFailed {
                            message: format!("{step} failed"),
                        }
                    } else {
                        success(&step).ok_or_else(|| {
                            TestCaseError::fail(format!("cleanup step {step} in run stage"))
                        })?
                    };
                    dispatched.push(step);
                    events.push(event);
                }
            }
        }
    }

    Err(TestCaseError::fail("run stage did not finish"))
}

proptest! {
    #[test]
    fn run_stage_completes_and_respects_dependencies(
        config in project_strategy(8),
        limit in proptest::option::of(1..4usize),
    ) {
        let graph = ContainerDependencyGraph::resolve(&config, "run").expect("acyclic by construction");
        let mut options = RunOptions::for_task("run");
        options.max_parallelism = limit;
        let machine = TaskStateMachine::new(Arc::new(graph), Arc::new(options));

        let sim = simulate(&machine, None)?;
        prop_assert_eq!(sim.result, TaskResult::Succeeded { exit_code: 0 });

        // Every container is created only once all of its dependencies are ready.
        let mut ready = HashSet::new();
        for event in sim.events.iter() {
            match event {
                TaskEvent::ContainerBecameReady { container } => {
                    ready.insert(container.clone());
                }
                TaskEvent::ContainerCreated { container, .. } => {
                    let deps = machine.graph().dependencies_of(container).expect("in graph");
                    prop_assert!(deps.iter().all(|d| ready.contains(d)), "{} created early", container);
                }
                _ => {}
            }
        }

        // Each image reference is pulled at most once.
        let pulls: Vec<&TaskStep> = sim
            .dispatched
            .iter()
            .filter(|s| matches!(s, TaskStep::PullImage { .. }))
            .collect();
        let unique: HashSet<&&TaskStep> = pulls.iter().collect();
        prop_assert_eq!(pulls.len(), unique.len());
    }

    #[test]
    fn nothing_is_dispatched_after_a_failure(
        config in project_strategy(6),
        fail_at in 0..12usize,
    ) {
        let graph = ContainerDependencyGraph::resolve(&config, "run").expect("acyclic by construction");
        let machine = TaskStateMachine::new(Arc::new(graph), Arc::new(RunOptions::for_task("run")));

        let sim = simulate(&machine, Some(fail_at))?;

        if sim.dispatched.len() > fail_at {
            prop_assert_eq!(sim.result, TaskResult::Failed);
            // The failing step's batch may finish, but no later batch starts.
            let failure = sim
                .events
                .iter()
                .position(|e| matches!(e, TaskEvent::ExecutionFailed { .. }))
                .expect("failure was posted");
            let batch_end = sim.events[failure..]
                .iter()
                .position(|e| matches!(e, TaskEvent::StepStarting { .. }));
            prop_assert!(batch_end.is_none(), "steps started after the failure");
        } else {
            prop_assert_eq!(sim.result, TaskResult::Succeeded { exit_code: 0 });
        }
    }

    #[test]
    fn cleanup_removes_dependents_before_dependencies(config in project_strategy(8)) {
        let graph = ContainerDependencyGraph::resolve(&config, "run").expect("acyclic by construction");
        let machine = TaskStateMachine::new(Arc::new(graph), Arc::new(RunOptions::for_task("run")));

        let sim = simulate(&machine, None)?;
        let plan = match machine.cleanup(&sim.events, sim.result) {
            CleanupDecision::Run(plan) => plan,
            CleanupDecision::Skip(manual) => {
                return Err(TestCaseError::fail(format!("cleanup skipped: {manual:?}")));
            }
        };

        let removal_group = |name: &str| {
            plan.groups.iter().position(|group| {
                group.iter().any(|s| matches!(s, TaskStep::RemoveContainer { container, .. } if container == name))
            })
        };

        for container in machine.graph().containers() {
            let own = removal_group(&container.name);
            prop_assert!(own.is_some(), "{} is never removed", container.name);
            for dependent in machine.graph().dependents_of(&container.name).expect("in graph") {
                prop_assert!(removal_group(dependent) < own, "{} removed before {}", container.name, dependent);
            }
        }

        // The network goes last.
        let last = plan.groups.last().expect("something to clean up");
        prop_assert!(matches!(last.as_slice(), [TaskStep::DeleteTaskNetwork { .. }]), "the network should be deleted last");
    }
}
