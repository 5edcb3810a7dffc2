// src/exec/runners/caches.rs

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::caches::{CacheResolution, CacheStore, resolve_caches};
use crate::docker::{ContainerCreationRequest, MountSource, MountSpec, Network, PullProgress};
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

/// Image of the short-lived container that hands volume caches to the
/// current user.
pub const CACHE_INIT_IMAGE: &str = "busybox:1.36";

pub async fn initialise(runner: &TaskStepRunner, ctx: &StepContext) {
    match initialise_caches(runner, ctx).await {
        Ok(()) => {
            info!("caches initialised");
            ctx.post(TaskEvent::CachesInitialised);
        }
        Err(err) => {
            let message = format!("{err:#}");
            warn!(%message, "cache initialisation failed");
            ctx.post(TaskEvent::CacheInitialisationFailed { message });
        }
    }
}

async fn initialise_caches(runner: &TaskStepRunner, ctx: &StepContext) -> Result<()> {
    let resolution = resolve_caches(&ctx.graph, &runner.caches)?;

    for cache in resolution.iter() {
        if let CacheStore::Directory(path) = &cache.store {
            debug!(cache = %cache.name, path = %path.display(), "creating cache directory");
            runner
                .fs
                .create_dir_all(path)
                .with_context(|| format!("Could not create directory for cache '{}'", cache.name))?;
        }
    }

    let volumes = volumes_needing_owner(&resolution);
    if volumes.is_empty() {
        return Ok(());
    }

    chown_volumes(runner, ctx, &volumes).await
}

/// Volume caches mounted into run-as-current-user containers. Engines create
/// volumes owned by root, so these have to be handed over first.
fn volumes_needing_owner(resolution: &CacheResolution) -> Vec<String> {
    resolution
        .iter()
        .filter(|cache| cache.run_as_current_user)
        .filter_map(|cache| match &cache.store {
            CacheStore::Volume(volume) => Some(volume.clone()),
            CacheStore::Directory(_) => None,
        })
        .collect()
}

async fn chown_volumes(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    volumes: &[String],
) -> Result<()> {
    let no_progress = |_: PullProgress| {};
    let image = runner
        .engine
        .pull_image(CACHE_INIT_IMAGE, false, &ctx.cancellation, &no_progress)
        .await
        .context("Could not pull the cache initialisation image")?;

    let mounts: Vec<MountSpec> = volumes
        .iter()
        .enumerate()
        .map(|(index, volume)| MountSpec {
            source: MountSource::Volume(volume.clone()),
            container_path: format!("/caches/{index}"),
            options: None,
        })
        .collect();

    let targets: Vec<String> = mounts.iter().map(|m| m.container_path.clone()).collect();
    let script = format!("chown {} {}", runner.user.user_and_group(), targets.join(" "));

    let request = ContainerCreationRequest {
        name: runner.naming.cache_init_container_name(),
        image,
        network: Network::new("default"),
        network_alias: None,
        command: vec!["sh".to_string(), "-c".to_string(), script],
        environment: Default::default(),
        working_directory: None,
        mounts,
        user: None,
    };

    let handle = runner
        .engine
        .create_container(&request)
        .await
        .context("Could not create the cache initialisation container")?;

    let outcome = async {
        runner
            .engine
            .start_container(&handle)
            .await
            .context("Could not start the cache initialisation container")?;
        runner
            .engine
            .wait_for_exit(&handle, &ctx.cancellation)
            .await
            .context("Could not run the cache initialisation container")
    }
    .await;

    if let Err(err) = runner.engine.remove_container(&handle).await {
        warn!(container = %handle, error = %err, "could not remove cache initialisation container");
    }

    match outcome? {
        0 => Ok(()),
        code => bail!("The cache initialisation container exited with code {code}."),
    }
}
