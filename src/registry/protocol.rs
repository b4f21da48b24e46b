//! Registry HTTP API Contracts
//!
//! Endpoint paths and JSON payloads of the registry service the HTTP backend
//! talks to. The service side lives outside this crate; these types define
//! the wire contract the worker relies on.

use serde::{Deserialize, Serialize};

use super::types::*;

// Endpoints
pub const ENDPOINT_TASK_LOCK: &str = "/tasks/lock";
pub const ENDPOINT_TASK_UNLOCK: &str = "/tasks/unlock";
pub const ENDPOINT_TASK_GET: &str = "/tasks/get";
pub const ENDPOINT_TASK_UPDATE: &str = "/tasks/update";
pub const ENDPOINT_TASK_STATUS: &str = "/tasks/status";
pub const ENDPOINT_TASK_STAGE: &str = "/tasks/stage";
pub const ENDPOINT_TASK_COUNT: &str = "/tasks/count";
pub const ENDPOINT_TASK_TERMINATE_RUNNING: &str = "/tasks/terminate_running";
pub const ENDPOINT_JOB_GET: &str = "/jobs/get";
pub const ENDPOINT_JOB_STATUS: &str = "/jobs/status";
pub const ENDPOINT_PROCESS_STATUS: &str = "/processes/status";

// Atomic claim of one matching task
#[derive(Debug, Serialize, Deserialize)]
pub struct LockTaskRequest {
    pub filter: TaskFilter,
    pub process_id: ProcessId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlockTaskRequest {
    pub task_id: TaskId,
    pub process_id: ProcessId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub task_id: TaskId,
    pub fields: TaskFields,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTaskStageRequest {
    pub task_id: TaskId,
    pub stage: TaskStage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountTasksRequest {
    pub filter: TaskFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountTasksResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TerminateRunningRequest {
    pub job_id: JobId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetJobRequest {
    pub job_id: JobId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job: Job,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateJobStatusRequest {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetProcessStatusRequest {
    pub process_id: ProcessId,
    pub status: ProcessStatus,
}
