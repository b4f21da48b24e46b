//! HTTP Registry Backend
//!
//! Production [`TaskRegistry`] implementation speaking JSON to the shared
//! registry service. Transport hiccups are smoothed over with a short
//! bounded retry per request; anything that survives it surfaces as
//! [`RegistryError::Unavailable`] and is handled by the caller's own retry
//! policy (the adapter's repeat-until-success, or the listener's fatal path).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::error::{RegistryError, RegistryResult};
use super::protocol::*;
use super::types::*;
use super::TaskRegistry;

pub struct HttpRegistry {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
        timeout: std::time::Duration,
        attempts: usize,
    ) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(RegistryError::Unavailable(e.to_string()));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(RegistryError::Unavailable(
            "retry attempts exhausted".to_string(),
        ))
    }

    /// Sends `payload` to `endpoint` and decodes a JSON body of type `R`.
    async fn call<T: serde::Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> RegistryResult<R> {
        let response = self
            .post_with_retry(endpoint, payload, std::time::Duration::from_secs(5), 3)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound),
            status if status.is_success() => response
                .json::<R>()
                .await
                .map_err(|e| RegistryError::Unavailable(e.to_string())),
            status => Err(RegistryError::Unavailable(format!(
                "registry returned {} for {}",
                status, endpoint
            ))),
        }
    }

    /// Like `call`, for endpoints whose success response carries no body.
    async fn call_unit<T: serde::Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> RegistryResult<()> {
        let response = self
            .post_with_retry(endpoint, payload, std::time::Duration::from_secs(5), 3)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound),
            status if status.is_success() => Ok(()),
            status => Err(RegistryError::Unavailable(format!(
                "registry returned {} for {}",
                status, endpoint
            ))),
        }
    }
}

#[async_trait]
impl TaskRegistry for HttpRegistry {
    async fn lock_task(
        &self,
        filter: TaskFilter,
        process_id: &ProcessId,
    ) -> RegistryResult<Task> {
        let request = LockTaskRequest {
            filter,
            process_id: process_id.clone(),
        };
        let response: TaskResponse = self.call(ENDPOINT_TASK_LOCK, &request).await?;
        Ok(response.task)
    }

    async fn unlock_task(&self, id: &TaskId, process_id: &ProcessId) -> RegistryResult<()> {
        let request = UnlockTaskRequest {
            task_id: id.clone(),
            process_id: process_id.clone(),
        };
        self.call_unit(ENDPOINT_TASK_UNLOCK, &request).await
    }

    async fn get_task(&self, id: &TaskId) -> RegistryResult<Task> {
        let response: TaskResponse = self.call(ENDPOINT_TASK_GET, id).await?;
        Ok(response.task)
    }

    async fn update_task(&self, id: &TaskId, fields: TaskFields) -> RegistryResult<()> {
        let request = UpdateTaskRequest {
            task_id: id.clone(),
            fields,
        };
        self.call_unit(ENDPOINT_TASK_UPDATE, &request).await
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        message: &str,
    ) -> RegistryResult<()> {
        let request = UpdateTaskStatusRequest {
            task_id: id.clone(),
            status,
            message: message.to_string(),
        };
        self.call_unit(ENDPOINT_TASK_STATUS, &request).await
    }

    async fn update_task_stage(&self, id: &TaskId, stage: TaskStage) -> RegistryResult<()> {
        let request = UpdateTaskStageRequest {
            task_id: id.clone(),
            stage,
        };
        self.call_unit(ENDPOINT_TASK_STAGE, &request).await
    }

    async fn count_tasks(&self, filter: TaskFilter) -> RegistryResult<u64> {
        let request = CountTasksRequest { filter };
        let response: CountTasksResponse = self.call(ENDPOINT_TASK_COUNT, &request).await?;
        Ok(response.count)
    }

    async fn get_job(&self, id: &JobId) -> RegistryResult<Job> {
        let request = GetJobRequest { job_id: id.clone() };
        let response: JobResponse = self.call(ENDPOINT_JOB_GET, &request).await?;
        Ok(response.job)
    }

    async fn update_job_status(&self, id: &JobId, status: JobStatus) -> RegistryResult<()> {
        let request = UpdateJobStatusRequest {
            job_id: id.clone(),
            status,
        };
        self.call_unit(ENDPOINT_JOB_STATUS, &request).await
    }

    async fn terminate_running_tasks(&self, job_id: &JobId) -> RegistryResult<()> {
        let request = TerminateRunningRequest {
            job_id: job_id.clone(),
        };
        self.call_unit(ENDPOINT_TASK_TERMINATE_RUNNING, &request).await
    }

    async fn set_process_status(
        &self,
        process_id: &ProcessId,
        status: ProcessStatus,
    ) -> RegistryResult<()> {
        let request = SetProcessStatusRequest {
            process_id: process_id.clone(),
            status,
        };
        self.call_unit(ENDPOINT_PROCESS_STATUS, &request).await
    }
}
