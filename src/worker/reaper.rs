//! Job-Completion Reaper
//!
//! After a task completes, the owning job may have reached its completion
//! threshold. The reaper checks the threshold and, when crossed, completes
//! the job and bulk-terminates its still-running sibling tasks. Workers
//! running those siblings observe the change at their next inter-pipeline
//! status re-check and short-circuit to the terminated handler.
//!
//! Two workers completing tasks concurrently may both cross the threshold and
//! both run the cascade; the job-status write and the bulk terminate are
//! idempotent, so the repetition is harmless.

use crate::registry::types::{JobStatus, Task, TaskFilter, TaskStatus};

use super::context::WorkerContext;

pub async fn handle_task_completion(ctx: &WorkerContext, task: &Task) {
    let job = ctx.registry.get_job(&task.job).await;
    if job.max_tasks == 0 {
        return;
    }

    let filter = TaskFilter::with_status(TaskStatus::Completed).job(task.job.clone());
    let completed = ctx.registry.count_tasks(&filter).await;

    if completed >= job.max_tasks {
        ctx.registry
            .update_job_status(&task.job, JobStatus::Completed)
            .await;
        ctx.registry.terminate_running_tasks(&task.job).await;

        tracing::info!(
            job_id = %task.job,
            user = %task.user,
            dataset = %task.dataset,
            objective = %task.objective,
            "JOB COMPLETED"
        );
    }
}
