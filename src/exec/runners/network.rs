// src/exec/runners/network.rs

use tracing::{info, warn};

use crate::docker::Network;
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

pub const NETWORK_DRIVER: &str = "bridge";

pub async fn create(runner: &TaskStepRunner, ctx: &StepContext) {
    let name = runner.naming.network_name();

    match runner.engine.create_network(&name, NETWORK_DRIVER).await {
        Ok(network) => {
            info!(network = %network.id, "created task network");
            ctx.post(TaskEvent::TaskNetworkCreated { network });
        }
        Err(err) => {
            warn!(%name, error = %err, "could not create task network");
            ctx.post(TaskEvent::TaskNetworkCreationFailed {
                message: err.to_string(),
            });
        }
    }
}

pub async fn delete(runner: &TaskStepRunner, ctx: &StepContext, network: Network) {
    match runner.engine.delete_network(&network).await {
        Ok(()) => {
            info!(network = %network.id, "deleted task network");
            ctx.post(TaskEvent::TaskNetworkDeleted { network });
        }
        Err(err) => {
            warn!(network = %network.id, error = %err, "could not delete task network");
            ctx.post(TaskEvent::TaskNetworkDeletionFailed {
                network,
                message: err.to_string(),
            });
        }
    }
}
