//! Shared Registry Module
//!
//! The registry is the durable, transactional store of tasks, jobs, and
//! processes that all workers in the pool coordinate through. This module
//! defines the data model, the backend trait, and the retry-wrapping handle
//! the pipeline driver talks to.
//!
//! ## Locking Protocol
//! Task claims go through `lock_task`, an atomic compare-and-set: when two
//! workers race for the same scheduled task, exactly one observes success.
//! Only the lock holder may mutate a task's stage; status may additionally be
//! mutated by external actors (pause/terminate requests), which the worker
//! observes at its inter-stage re-checks.
//!
//! ## Submodules
//! - **`types`**: Task/Job/Process data model shared with the registry service.
//! - **`error`**: Backend error type separating the not-found sentinel from
//!   transient failure.
//! - **`protocol`**: HTTP API contracts of the registry service.
//! - **`http`**: Production backend speaking JSON over HTTP.
//! - **`memory`**: In-process backend for standalone mode and tests.
//! - **`adapter`**: `RegistryHandle`, wrapping every call in
//!   repeat-until-success.

pub mod adapter;
pub mod error;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod types;


use async_trait::async_trait;

use error::RegistryResult;
use types::{
    Job, JobId, JobStatus, ProcessId, ProcessStatus, Task, TaskFields, TaskFilter, TaskId,
    TaskStage, TaskStatus,
};

/// Backend operations the worker depends on.
///
/// Implementations must make `lock_task` atomic and keep every mutation
/// idempotent, so the retry wrapper in [`adapter`] can safely repeat a write
/// whose acknowledgement was lost.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Atomically claims one task matching `filter`, tagging it with
    /// `process_id`. Returns `NotFound` when nothing matches.
    async fn lock_task(&self, filter: TaskFilter, process_id: &ProcessId)
        -> RegistryResult<Task>;

    /// Releases the lock on `id`, provided `process_id` holds it.
    async fn unlock_task(&self, id: &TaskId, process_id: &ProcessId) -> RegistryResult<()>;

    async fn get_task(&self, id: &TaskId) -> RegistryResult<Task>;

    async fn update_task(&self, id: &TaskId, fields: TaskFields) -> RegistryResult<()>;

    /// Sets the task status. `message` populates the task's error field and
    /// is only meaningful together with [`TaskStatus::Error`].
    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: &str,
    ) -> RegistryResult<()>;

    async fn update_task_stage(&self, id: &TaskId, stage: TaskStage) -> RegistryResult<()>;

    async fn count_tasks(&self, filter: TaskFilter) -> RegistryResult<u64>;

    async fn get_job(&self, id: &JobId) -> RegistryResult<Job>;

    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> RegistryResult<()>;

    /// Marks every running task of `job_id` as terminating, as a single
    /// registry operation.
    async fn terminate_running_tasks(&self, job_id: &JobId) -> RegistryResult<()>;

    async fn set_process_status(
        &self,
        process_id: &ProcessId,
        status: ProcessStatus,
    ) -> RegistryResult<()>;
}
