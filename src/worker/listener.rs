//! Task Run Listener
//!
//! The worker's outer loop: periodically tries to claim a task in the
//! `scheduled` state and, on success, hands it to the pipeline driver while
//! signalling the process's working/idle state in the registry.
//!
//! A claim that finds nothing is the normal idle path and triggers a
//! poll-period sleep. Any other claim failure is treated as a systemic
//! registry fault: the loop returns the error and the process exits non-zero
//! so the supervisor can restart it.

use anyhow::Result;

use crate::registry::types::{ProcessStatus, TaskFilter, TaskStatus};

use super::context::WorkerContext;
use super::pipeline;

/// Runs the claim loop. Never returns under normal operation.
pub async fn run(ctx: &WorkerContext) -> Result<()> {
    loop {
        let claim = ctx
            .registry
            .lock_task(TaskFilter::with_status(TaskStatus::Scheduled), &ctx.process_id)
            .await;

        match claim {
            Ok(task) => {
                // Mark the process as working.
                ctx.registry
                    .set_process_status(&ctx.process_id, ProcessStatus::Working)
                    .await;

                tracing::info!("TASK FOUND FOR EXECUTION");
                pipeline::run_task(ctx, task).await?;

                // Mark the process as idle.
                ctx.registry
                    .set_process_status(&ctx.process_id, ProcessStatus::Idle)
                    .await;
            }
            Err(e) if e.is_not_found() => {
                tokio::time::sleep(ctx.period).await;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context("task claim failed"));
            }
        }
    }
}
