use serde::{Deserialize, Serialize};

/// Unique identifier for a task.
/// Wrapper around a UUID string to ensure global uniqueness across workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a job (a user submission expanding into tasks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a worker process participating in the pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProcessId(pub String);

impl ProcessId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a user-supplied container module (model or objective).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ModuleId(pub String);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DatasetId(pub String);

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a task.
///
/// `Pausing` and `Terminating` are transient states written by external
/// actors; the worker observes them at its inter-stage re-checks and commits
/// the matching terminal state (`Paused` / `Terminated`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Scheduled,
    Running,
    Pausing,
    Paused,
    Terminating,
    Terminated,
    Completed,
    Error,
}

/// Position of a task within its execution pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStage {
    Begin,
    Training,
    Predicting,
    Evaluating,
    End,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Terminated,
}

/// Whether a worker process is currently executing a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Idle,
    Working,
}

/// Which contract a module image implements. Selects the image subtree on
/// disk and the argv contract the container is invoked with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Model,
    Objective,
}

/// A dataset partition. Prediction and evaluation run once per split.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single model/objective/dataset pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job: JobId,
    pub user: String,
    pub model: ModuleId,
    pub objective: ModuleId,
    pub dataset: DatasetId,
    /// Opaque configuration payload passed verbatim to the model container.
    pub config: String,
    pub status: TaskStatus,
    pub stage: TaskStage,
    /// Quality score over the `val` split; set exactly once at evaluation.
    pub quality: Option<f64>,
    /// Quality score over the `train` split; set exactly once at evaluation.
    pub quality_train: Option<f64>,
    /// Human-readable failure message; non-empty whenever status is `Error`.
    pub error: Option<String>,
    /// Exclusive lock holder. Only the holder may mutate the task's stage.
    pub locked_by: Option<ProcessId>,
    pub created_at: u64,
}

impl Task {
    /// A freshly submitted task, ready to be claimed by a worker.
    pub fn scheduled(
        job: JobId,
        user: impl Into<String>,
        model: ModuleId,
        objective: ModuleId,
        dataset: DatasetId,
        config: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            job,
            user: user.into(),
            model,
            objective,
            dataset,
            config: config.into(),
            status: TaskStatus::Scheduled,
            stage: TaskStage::Begin,
            quality: None,
            quality_train: None,
            error: None,
            locked_by: None,
            created_at: now_ms(),
        }
    }
}

/// A user submission expanding into one or more tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user: String,
    pub status: JobStatus,
    /// Completion threshold: once this many tasks complete, the job completes
    /// and its remaining running tasks are terminated. Zero means unbounded.
    pub max_tasks: u64,
}

/// A worker process as registered in the shared registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub status: ProcessStatus,
    pub started_at: u64,
}

/// Predicate over tasks, used for atomic claims and counting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub job: Option<JobId>,
}

impl TaskFilter {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn job(mut self, job: JobId) -> Self {
        self.job = Some(job);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(job) = &self.job {
            if &task.job != job {
                return false;
            }
        }
        true
    }
}

/// Partial update applied to a task via `update_task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFields {
    pub quality: Option<f64>,
    pub quality_train: Option<f64>,
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
