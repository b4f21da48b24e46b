//! In-Memory Registry Backend
//!
//! A process-local [`TaskRegistry`] used by `--standalone` mode and by the
//! test suite. State lives in `DashMap`s; every mutation happens under the
//! exclusive per-entry guard, which is what makes the claim protocol atomic:
//! candidates are scanned first, then re-validated under the guard, so two
//! racing claimants cannot both observe a scheduled, unlocked task.

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;

use super::error::{RegistryError, RegistryResult};
use super::types::*;
use super::TaskRegistry;

#[derive(Default)]
pub struct InMemoryRegistry {
    tasks: DashMap<TaskId, Task>,
    jobs: DashMap<JobId, Job>,
    processes: DashMap<ProcessId, Process>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn insert_job(&self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    /// Snapshot of a single task, for assertions and the stats surface.
    pub fn task_snapshot(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).map(|entry| entry.clone())
    }

    pub fn job_snapshot(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.clone())
    }

    pub fn process_snapshot(&self, id: &ProcessId) -> Option<Process> {
        self.processes.get(id).map(|entry| entry.clone())
    }

    /// Directly overwrites a task's status, standing in for the external
    /// actors (pause/terminate requests from the API layer) that mutate
    /// status without holding the task's lock.
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) {
        if let Some(mut entry) = self.tasks.get_mut(id) {
            entry.status = status;
        }
    }
}

#[async_trait]
impl TaskRegistry for InMemoryRegistry {
    async fn lock_task(
        &self,
        filter: TaskFilter,
        process_id: &ProcessId,
    ) -> RegistryResult<Task> {
        let candidates: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| filter.matches(entry.value()) && entry.value().locked_by.is_none())
            .map(|entry| entry.key().clone())
            .collect();

        for id in candidates {
            if let Some(mut entry) = self.tasks.get_mut(&id) {
                // Re-validate under the entry guard; another claimant may have
                // won the race between the scan and this lookup.
                if filter.matches(entry.value()) && entry.locked_by.is_none() {
                    entry.locked_by = Some(process_id.clone());
                    return Ok(entry.clone());
                }
            }
        }

        Err(RegistryError::NotFound)
    }

    async fn unlock_task(&self, id: &TaskId, process_id: &ProcessId) -> RegistryResult<()> {
        let mut entry = self.tasks.get_mut(id).ok_or(RegistryError::NotFound)?;
        match &entry.locked_by {
            Some(holder) if holder != process_id => Err(RegistryError::Other(anyhow!(
                "task {} is locked by {}, not {}",
                id,
                holder,
                process_id
            ))),
            // Already unlocked counts as success: unlock is idempotent.
            _ => {
                entry.locked_by = None;
                Ok(())
            }
        }
    }

    async fn get_task(&self, id: &TaskId) -> RegistryResult<Task> {
        self.tasks
            .get(id)
            .map(|entry| entry.clone())
            .ok_or(RegistryError::NotFound)
    }

    async fn update_task(&self, id: &TaskId, fields: TaskFields) -> RegistryResult<()> {
        let mut entry = self.tasks.get_mut(id).ok_or(RegistryError::NotFound)?;
        if let Some(quality) = fields.quality {
            entry.quality = Some(quality);
        }
        if let Some(quality_train) = fields.quality_train {
            entry.quality_train = Some(quality_train);
        }
        Ok(())
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: &str,
    ) -> RegistryResult<()> {
        let mut entry = self.tasks.get_mut(id).ok_or(RegistryError::NotFound)?;
        entry.status = status;
        entry.error = if message.is_empty() {
            None
        } else {
            Some(message.to_string())
        };
        Ok(())
    }

    async fn update_task_stage(&self, id: &TaskId, stage: TaskStage) -> RegistryResult<()> {
        let mut entry = self.tasks.get_mut(id).ok_or(RegistryError::NotFound)?;
        entry.stage = stage;
        Ok(())
    }

    async fn count_tasks(&self, filter: TaskFilter) -> RegistryResult<u64> {
        let count = self
            .tasks
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();
        Ok(count as u64)
    }

    async fn get_job(&self, id: &JobId) -> RegistryResult<Job> {
        self.jobs
            .get(id)
            .map(|entry| entry.clone())
            .ok_or(RegistryError::NotFound)
    }

    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> RegistryResult<()> {
        let mut entry = self.jobs.get_mut(id).ok_or(RegistryError::NotFound)?;
        entry.status = status;
        Ok(())
    }

    async fn terminate_running_tasks(&self, job_id: &JobId) -> RegistryResult<()> {
        let running: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| {
                &entry.value().job == job_id && entry.value().status == TaskStatus::Running
            })
            .map(|entry| entry.key().clone())
            .collect();

        for id in running {
            if let Some(mut entry) = self.tasks.get_mut(&id) {
                if entry.status == TaskStatus::Running {
                    entry.status = TaskStatus::Terminating;
                }
            }
        }
        Ok(())
    }

    async fn set_process_status(
        &self,
        process_id: &ProcessId,
        status: ProcessStatus,
    ) -> RegistryResult<()> {
        self.processes
            .entry(process_id.clone())
            .and_modify(|process| process.status = status)
            .or_insert_with(|| Process {
                id: process_id.clone(),
                status,
                started_at: now_ms(),
            });
        Ok(())
    }
}
