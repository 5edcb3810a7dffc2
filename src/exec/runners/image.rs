// src/exec/runners/image.rs

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::dag::{ContainerName, ImageSource};
use crate::docker::{BuildProgress, ImageBuildRequest, PullProgress};
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

pub async fn build(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    tags: Vec<String>,
) {
    let Some(ImageSource::Build {
        build_directory,
        dockerfile,
        build_args,
    }) = ctx.container(&container).map(|c| &c.image_source)
    else {
        ctx.post(TaskEvent::ImageBuildFailed {
            message: format!("Container '{container}' does not have a build directory."),
            container,
        });
        return;
    };

    let request = ImageBuildRequest {
        build_directory: build_directory.clone(),
        dockerfile: dockerfile.clone(),
        build_args: effective_build_args(runner, ctx, build_args),
        tags,
    };

    let on_progress = |progress: BuildProgress| {
        ctx.post(TaskEvent::ImageBuildProgress {
            container: container.clone(),
            progress,
        });
    };

    match runner
        .engine
        .build_image(&request, &ctx.cancellation, &on_progress)
        .await
    {
        Ok(image) => {
            info!(%container, image = %image.id, "built image");
            ctx.post(TaskEvent::ImageBuilt { container, image });
        }
        Err(err) => {
            warn!(%container, error = %err, "image build failed");
            ctx.post(TaskEvent::ImageBuildFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}

/// Proxy variables (when propagated) overlaid by the configured build args.
fn effective_build_args(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    configured: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut args = if ctx.options.propagate_proxy_environment_variables {
        runner.proxy.variables(&[])
    } else {
        BTreeMap::new()
    };
    args.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
    args
}

pub async fn pull(runner: &TaskStepRunner, ctx: &StepContext, reference: String) {
    let on_progress = |progress: PullProgress| {
        ctx.post(TaskEvent::ImagePullProgress {
            reference: reference.clone(),
            progress,
        });
    };

    match runner
        .engine
        .pull_image(&reference, false, &ctx.cancellation, &on_progress)
        .await
    {
        Ok(image) => {
            info!(%reference, image = %image.id, "pulled image");
            ctx.post(TaskEvent::ImagePulled { reference, image });
        }
        Err(err) => {
            warn!(%reference, error = %err, "image pull failed");
            ctx.post(TaskEvent::ImagePullFailed {
                reference,
                message: err.to_string(),
            });
        }
    }
}
