//! Registry Handle
//!
//! The facade the worker talks to. Every operation the pipeline depends on is
//! wrapped in **repeat-until-success**: transient registry failures are
//! retried forever with backoff and jitter, because the wrapped operations
//! are idempotent and the worker cannot make progress without them.
//!
//! The one deliberate exception is `lock_task`: its not-found result is the
//! listener's idle sentinel and must pass through unchanged, and any other
//! claim failure is the listener's signal to abort the process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::RegistryResult;
use super::types::*;
use super::TaskRegistry;

#[derive(Clone)]
pub struct RegistryHandle {
    inner: Arc<dyn TaskRegistry>,
}

impl RegistryHandle {
    pub fn new(inner: Arc<dyn TaskRegistry>) -> Self {
        Self { inner }
    }

    /// Runs `op` until it succeeds, sleeping with exponential backoff and
    /// jitter between attempts. `op` must be idempotent.
    async fn repeat_until_success<T, F, Fut>(&self, operation: &'static str, mut op: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RegistryResult<T>>,
    {
        let mut delay_ms = 150u64;

        loop {
            match op().await {
                Ok(value) => return value,
                Err(e) => {
                    tracing::warn!("Registry operation {} failed, retrying: {}", operation, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }
    }

    /// Atomic claim. Not retried: `NotFound` means "no task ready" and any
    /// other failure is fatal to the caller.
    pub async fn lock_task(
        &self,
        filter: TaskFilter,
        process_id: &ProcessId,
    ) -> RegistryResult<Task> {
        self.inner.lock_task(filter, process_id).await
    }

    pub async fn unlock_task(&self, id: &TaskId, process_id: &ProcessId) {
        self.repeat_until_success("unlock_task", || self.inner.unlock_task(id, process_id))
            .await
    }

    pub async fn get_task(&self, id: &TaskId) -> Task {
        self.repeat_until_success("get_task", || self.inner.get_task(id))
            .await
    }

    pub async fn update_task(&self, id: &TaskId, fields: &TaskFields) {
        self.repeat_until_success("update_task", || {
            self.inner.update_task(id, fields.clone())
        })
        .await
    }

    pub async fn update_task_status(&self, id: &TaskId, status: TaskStatus, message: &str) {
        self.repeat_until_success("update_task_status", || {
            self.inner.update_task_status(id, status, message)
        })
        .await
    }

    pub async fn update_task_stage(&self, id: &TaskId, stage: TaskStage) {
        self.repeat_until_success("update_task_stage", || {
            self.inner.update_task_stage(id, stage)
        })
        .await
    }

    pub async fn count_tasks(&self, filter: &TaskFilter) -> u64 {
        self.repeat_until_success("count_tasks", || self.inner.count_tasks(filter.clone()))
            .await
    }

    pub async fn get_job(&self, id: &JobId) -> Job {
        self.repeat_until_success("get_job", || self.inner.get_job(id))
            .await
    }

    pub async fn update_job_status(&self, id: &JobId, status: JobStatus) {
        self.repeat_until_success("update_job_status", || {
            self.inner.update_job_status(id, status)
        })
        .await
    }

    pub async fn terminate_running_tasks(&self, job_id: &JobId) {
        self.repeat_until_success("terminate_running_tasks", || {
            self.inner.terminate_running_tasks(job_id)
        })
        .await
    }

    pub async fn set_process_status(&self, process_id: &ProcessId, status: ProcessStatus) {
        self.repeat_until_success("set_process_status", || {
            self.inner.set_process_status(process_id, status)
        })
        .await
    }
}
