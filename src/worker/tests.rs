//! Worker Module Tests
//!
//! Exercises the pipeline driver, stage executors, listener, and reaper
//! against the in-memory registry with scripted container collaborators.
//!
//! ## Test Scopes
//! - **Happy path**: full stage walk with durable outputs and quality scores.
//! - **Intervention**: termination and pausing observed at stage boundaries.
//! - **Failure classification**: load, parse, and empty-output errors.
//! - **Job cascade**: completion threshold terminating running siblings.
//! - **Crash recovery**: re-running an interrupted stage to the same result.

#[cfg(test)]
mod tests {
    use crate::modules::runtime::ContainerOutput;
    use crate::modules::{ContainerRuntime, ImageLoader};
    use crate::registry::adapter::RegistryHandle;
    use crate::registry::error::RegistryResult;
    use crate::registry::memory::InMemoryRegistry;
    use crate::registry::types::*;
    use crate::registry::TaskRegistry;
    use crate::storage::StorageContext;
    use crate::worker::stages::{parse_quality, StageCommand};
    use crate::worker::{listener, pipeline, WorkerContext};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // ============================================================
    // Scripted collaborators
    // ============================================================

    type Script = Box<dyn Fn(&str, &[String]) -> Result<Vec<u8>> + Send + Sync>;

    /// Container runtime driven by a closure keyed on the argv, recording
    /// every invocation.
    struct ScriptedRuntime {
        script: Script,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRuntime {
        fn new(
            script: impl Fn(&str, &[String]) -> Result<Vec<u8>> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn commands_run(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|argv| argv[0].clone())
                .collect()
        }
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn run(
            &self,
            image: &str,
            _env: &[(String, String)],
            argv: &[String],
        ) -> Result<ContainerOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            let bytes = (self.script)(image, argv)?;
            Ok(Box::new(std::io::Cursor::new(bytes)))
        }
    }

    /// Loader that resolves every image file to a deterministic name.
    struct StaticLoader;

    #[async_trait]
    impl ImageLoader for StaticLoader {
        async fn load(&self, image_path: &Path) -> Result<String> {
            Ok(format!("img:{}", image_path.display()))
        }
    }

    /// Loader standing in for a missing image file.
    struct FailingLoader;

    #[async_trait]
    impl ImageLoader for FailingLoader {
        async fn load(&self, image_path: &Path) -> Result<String> {
            Err(anyhow!(
                "module image not found at {}",
                image_path.display()
            ))
        }
    }

    /// The canonical module behavior: training logs an epoch, prediction
    /// writes a line, evaluation logs a line and reports quality 0.9.
    fn happy_script() -> impl Fn(&str, &[String]) -> Result<Vec<u8>> + Send + Sync {
        |_image, argv| match argv[0].as_str() {
            "train" => Ok(b"epoch 1 loss 0.5\n".to_vec()),
            "predict" => Ok(b"predictions written\n".to_vec()),
            "eval" => Ok(b"comparing outputs\n0.9\n".to_vec()),
            other => Err(anyhow!("unexpected command {}", other)),
        }
    }

    fn context_with(
        registry: Arc<InMemoryRegistry>,
        runtime: Arc<dyn ContainerRuntime>,
        loader: Arc<dyn ImageLoader>,
        root: &Path,
    ) -> WorkerContext {
        WorkerContext {
            process_id: ProcessId::new(),
            period: Duration::from_millis(10),
            mount_prefix: "/mnt/host".to_string(),
            registry: RegistryHandle::new(registry),
            storage: StorageContext::new(root),
            runtime,
            loader,
        }
    }

    fn scheduled_task(job: &JobId) -> Task {
        Task::scheduled(
            job.clone(),
            "alice",
            ModuleId("linreg".to_string()),
            ModuleId("rmse".to_string()),
            DatasetId("housing".to_string()),
            r#"{"lr":0.1}"#,
        )
    }

    fn running_job(max_tasks: u64) -> Job {
        Job {
            id: JobId::new(),
            user: "alice".to_string(),
            status: JobStatus::Running,
            max_tasks,
        }
    }

    /// Claims `task_id` the way the listener would, tagging the context's
    /// process id.
    async fn claim(registry: &Arc<InMemoryRegistry>, ctx: &WorkerContext) -> Task {
        registry
            .lock_task(
                TaskFilter::with_status(TaskStatus::Scheduled),
                &ctx.process_id,
            )
            .await
            .unwrap()
    }

    // ============================================================
    // TEST 1: happy path
    // ============================================================

    #[tokio::test]
    async fn test_happy_path_completes_task_with_qualities() {
        // ARRANGE
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let runtime = ScriptedRuntime::new(happy_script());
        let ctx = context_with(
            registry.clone(),
            runtime.clone(),
            Arc::new(StaticLoader),
            root.path(),
        );

        // ACT
        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        // ASSERT: terminal state
        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.stage, TaskStage::End);
        assert_eq!(snapshot.quality, Some(0.9));
        assert_eq!(snapshot.quality_train, Some(0.9));
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.locked_by, None);

        // ASSERT: every stage ran, in order
        assert_eq!(
            runtime.commands_run(),
            vec!["train", "predict", "predict", "eval", "eval"]
        );

        // ASSERT: durable outputs
        let paths = ctx.storage.task_paths(&task_id);
        assert_eq!(
            std::fs::read(paths.config_file()).unwrap(),
            br#"{"lr":0.1}"#
        );
        for file in [
            paths.logs.join("train.log"),
            paths.logs.join("predict.train.log"),
            paths.logs.join("predict.val.log"),
            paths.evaluations.join("evals.train.log"),
            paths.evaluations.join("evals.val.log"),
        ] {
            assert!(file.is_file(), "missing output file {}", file.display());
        }
        assert_eq!(
            std::fs::read_to_string(paths.evaluations.join("evals.val.log")).unwrap(),
            "comparing outputs"
        );
    }

    // ============================================================
    // TEST 2: stage/status progression is monotonic
    // ============================================================

    /// Registry wrapper recording every stage and status commit, for
    /// asserting the lawful transition sequence.
    struct RecordingRegistry {
        inner: Arc<InMemoryRegistry>,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskRegistry for RecordingRegistry {
        async fn lock_task(
            &self,
            filter: TaskFilter,
            process_id: &ProcessId,
        ) -> RegistryResult<Task> {
            self.inner.lock_task(filter, process_id).await
        }

        async fn unlock_task(&self, id: &TaskId, process_id: &ProcessId) -> RegistryResult<()> {
            self.events.lock().unwrap().push("unlock".to_string());
            self.inner.unlock_task(id, process_id).await
        }

        async fn get_task(&self, id: &TaskId) -> RegistryResult<Task> {
            self.inner.get_task(id).await
        }

        async fn update_task(&self, id: &TaskId, fields: TaskFields) -> RegistryResult<()> {
            self.events.lock().unwrap().push("quality".to_string());
            self.inner.update_task(id, fields).await
        }

        async fn update_task_status(
            &self,
            id: &TaskId,
            status: TaskStatus,
            message: &str,
        ) -> RegistryResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("status:{:?}", status));
            self.inner.update_task_status(id, status, message).await
        }

        async fn update_task_stage(&self, id: &TaskId, stage: TaskStage) -> RegistryResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("stage:{:?}", stage));
            self.inner.update_task_stage(id, stage).await
        }

        async fn count_tasks(&self, filter: TaskFilter) -> RegistryResult<u64> {
            self.inner.count_tasks(filter).await
        }

        async fn get_job(&self, id: &JobId) -> RegistryResult<Job> {
            self.inner.get_job(id).await
        }

        async fn update_job_status(&self, id: &JobId, status: JobStatus) -> RegistryResult<()> {
            self.inner.update_job_status(id, status).await
        }

        async fn terminate_running_tasks(&self, job_id: &JobId) -> RegistryResult<()> {
            self.inner.terminate_running_tasks(job_id).await
        }

        async fn set_process_status(
            &self,
            process_id: &ProcessId,
            status: ProcessStatus,
        ) -> RegistryResult<()> {
            self.inner.set_process_status(process_id, status).await
        }
    }

    #[tokio::test]
    async fn test_pipeline_commits_follow_canonical_sequence() {
        // ARRANGE
        let root = tempfile::tempdir().unwrap();
        let inner = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        inner.insert_job(job);
        let task = scheduled_task(&job_id);
        inner.insert_task(task.clone());

        let recording = Arc::new(RecordingRegistry {
            inner: inner.clone(),
            events: Mutex::new(Vec::new()),
        });

        let mut ctx = context_with(
            inner.clone(),
            ScriptedRuntime::new(happy_script()),
            Arc::new(StaticLoader),
            root.path(),
        );
        ctx.registry = RegistryHandle::new(recording.clone());

        let task = inner
            .lock_task(
                TaskFilter::with_status(TaskStatus::Scheduled),
                &ctx.process_id,
            )
            .await
            .unwrap();

        // ACT
        pipeline::run_task(&ctx, task).await.unwrap();

        // ASSERT: one commit per transition, stage end committed exactly once
        let events = recording.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "status:Running",
                "stage:Training",
                "stage:Predicting",
                "stage:Evaluating",
                "quality",
                "stage:End",
                "status:Completed",
                "unlock",
            ]
        );
    }

    // ============================================================
    // TEST 3: external intervention
    // ============================================================

    #[tokio::test]
    async fn test_termination_during_training_skips_remaining_stages() {
        // ARRANGE: the "API layer" flips the task to terminating while the
        // training container is still running
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let intervention_registry = registry.clone();
        let intervention_target = task_id.clone();
        let runtime = ScriptedRuntime::new(move |_image, argv| match argv[0].as_str() {
            "train" => {
                intervention_registry
                    .set_task_status(&intervention_target, TaskStatus::Terminating);
                Ok(b"epoch 1\n".to_vec())
            }
            other => Err(anyhow!("stage {} should have been skipped", other)),
        });

        let ctx = context_with(
            registry.clone(),
            runtime.clone(),
            Arc::new(StaticLoader),
            root.path(),
        );

        // ACT
        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        // ASSERT: training finished (it is never interrupted), the stage
        // commit landed, and everything after the re-check was skipped
        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Terminated);
        assert_eq!(snapshot.stage, TaskStage::Predicting);
        assert_eq!(snapshot.locked_by, None);
        assert_eq!(runtime.commands_run(), vec!["train"]);
    }

    #[tokio::test]
    async fn test_pausing_during_predicting_pauses_task() {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let intervention_registry = registry.clone();
        let intervention_target = task_id.clone();
        let runtime = ScriptedRuntime::new(move |_image, argv| match argv[0].as_str() {
            "train" => Ok(b"epoch 1\n".to_vec()),
            "predict" => {
                intervention_registry.set_task_status(&intervention_target, TaskStatus::Pausing);
                Ok(b"predictions written\n".to_vec())
            }
            other => Err(anyhow!("stage {} should have been skipped", other)),
        });

        let ctx = context_with(
            registry.clone(),
            runtime.clone(),
            Arc::new(StaticLoader),
            root.path(),
        );

        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        // Both predictions belong to one stage, so both run; evaluation is
        // skipped at the next boundary.
        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Paused);
        assert_eq!(snapshot.stage, TaskStage::Evaluating);
        assert_eq!(snapshot.locked_by, None);
        assert_eq!(runtime.commands_run(), vec!["train", "predict", "predict"]);
    }

    // ============================================================
    // TEST 4: failure classification
    // ============================================================

    #[tokio::test]
    async fn test_model_load_failure_marks_error_and_releases_lock() {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let runtime = ScriptedRuntime::new(|_image, argv| {
            Err(anyhow!("no container should start, got {}", argv[0]))
        });
        let ctx = context_with(
            registry.clone(),
            runtime,
            Arc::new(FailingLoader),
            root.path(),
        );

        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("module image not found"));
        assert_eq!(snapshot.stage, TaskStage::Begin);
        assert_eq!(snapshot.locked_by, None);

        // No task files were created.
        assert!(!root.path().join("tasks").join(&task_id.0).exists());
    }

    #[tokio::test]
    async fn test_container_start_failure_marks_error() {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let runtime = ScriptedRuntime::new(|_image, _argv| Err(anyhow!("docker daemon is down")));
        let ctx = context_with(
            registry.clone(),
            runtime,
            Arc::new(StaticLoader),
            root.path(),
        );

        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot.error.as_deref().unwrap().contains("docker daemon"));
        assert_eq!(snapshot.locked_by, None);
    }

    #[tokio::test]
    async fn test_evaluator_parse_failure_marks_error_without_qualities() {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let runtime = ScriptedRuntime::new(|_image, argv| match argv[0].as_str() {
            "train" => Ok(b"epoch 1\n".to_vec()),
            "predict" => Ok(b"predictions written\n".to_vec()),
            "eval" => Ok(b"not-a-number\n".to_vec()),
            other => Err(anyhow!("unexpected command {}", other)),
        });
        let ctx = context_with(
            registry.clone(),
            runtime,
            Arc::new(StaticLoader),
            root.path(),
        );

        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("not a quality score"));
        assert_eq!(snapshot.quality, None);
        assert_eq!(snapshot.quality_train, None);
        assert_eq!(snapshot.locked_by, None);
    }

    #[tokio::test]
    async fn test_empty_evaluator_output_is_parse_error_not_crash() {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let runtime = ScriptedRuntime::new(|_image, argv| match argv[0].as_str() {
            "eval" => Ok(Vec::new()),
            _ => Ok(b"ok\n".to_vec()),
        });
        let ctx = context_with(
            registry.clone(),
            runtime,
            Arc::new(StaticLoader),
            root.path(),
        );

        let task = claim(&registry, &ctx).await;
        pipeline::run_task(&ctx, task).await.unwrap();

        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot
            .error
            .as_deref()
            .unwrap()
            .contains("produced no output"));
    }

    // ============================================================
    // TEST 5: job completion cascade
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_job_completion_cascade_terminates_running_sibling() {
        // ARRANGE: job with a threshold of 2 and three tasks; the third
        // task's training is slow enough to still be running when the other
        // two cross the threshold
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(2);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task1 = scheduled_task(&job_id);
        let task2 = scheduled_task(&job_id);
        let (id1, id2) = (task1.id.clone(), task2.id.clone());
        registry.insert_task(task1);
        registry.insert_task(task2);

        let slow_runtime = ScriptedRuntime::new(|_image, argv| {
            if argv[0] == "train" {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(b"comparing outputs\n0.9\n".to_vec())
        });

        let ctx3 = context_with(
            registry.clone(),
            slow_runtime,
            Arc::new(StaticLoader),
            root.path(),
        );

        // The third task is already claimed by the slow worker, so the fast
        // workers cannot pick it up.
        let mut task3 = scheduled_task(&job_id);
        task3.locked_by = Some(ctx3.process_id.clone());
        let id3 = task3.id.clone();
        registry.insert_task(task3.clone());

        let slow_handle = {
            let ctx3 = ctx3.clone();
            tokio::spawn(async move { pipeline::run_task(&ctx3, task3).await })
        };

        // Give the slow worker time to mark its task running.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // ACT: two workers complete their tasks concurrently
        let ctx1 = context_with(
            registry.clone(),
            ScriptedRuntime::new(happy_script()),
            Arc::new(StaticLoader),
            root.path(),
        );
        let ctx2 = context_with(
            registry.clone(),
            ScriptedRuntime::new(happy_script()),
            Arc::new(StaticLoader),
            root.path(),
        );
        let fast1 = claim(&registry, &ctx1).await;
        let fast2 = claim(&registry, &ctx2).await;

        let (r1, r2) = tokio::join!(
            pipeline::run_task(&ctx1, fast1),
            pipeline::run_task(&ctx2, fast2)
        );
        r1.unwrap();
        r2.unwrap();

        slow_handle.await.unwrap().unwrap();

        // ASSERT
        assert_eq!(
            registry.job_snapshot(&job_id).unwrap().status,
            JobStatus::Completed
        );
        assert_eq!(
            registry.task_snapshot(&id1).unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(
            registry.task_snapshot(&id2).unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(
            registry.task_snapshot(&id3).unwrap().status,
            TaskStatus::Terminated
        );
    }

    // ============================================================
    // TEST 6: crash resumption
    // ============================================================

    #[tokio::test]
    async fn test_resumption_reruns_interrupted_training_stage() {
        // ARRANGE: a task left by a crashed worker between finishing its
        // training work and committing the next stage
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let runtime = ScriptedRuntime::new(happy_script());
        let ctx = context_with(
            registry.clone(),
            runtime.clone(),
            Arc::new(StaticLoader),
            root.path(),
        );

        let mut task = scheduled_task(&job_id);
        task.status = TaskStatus::Running;
        task.stage = TaskStage::Training;
        task.locked_by = Some(ctx.process_id.clone());
        let task_id = task.id.clone();
        registry.insert_task(task.clone());

        // ACT: the restarted worker re-drives the claimed task
        pipeline::run_task(&ctx, task).await.unwrap();

        // ASSERT: training re-ran and the pipeline completed normally
        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.stage, TaskStage::End);
        assert_eq!(snapshot.quality, Some(0.9));
        assert_eq!(snapshot.quality_train, Some(0.9));
        assert_eq!(
            runtime.commands_run(),
            vec!["train", "predict", "predict", "eval", "eval"]
        );
    }

    // ============================================================
    // TEST 7: listener loop
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_listener_claims_runs_and_returns_to_idle() {
        // ARRANGE
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let job = running_job(0);
        let job_id = job.id.clone();
        registry.insert_job(job);

        let task = scheduled_task(&job_id);
        let task_id = task.id.clone();
        registry.insert_task(task);

        let ctx = context_with(
            registry.clone(),
            ScriptedRuntime::new(happy_script()),
            Arc::new(StaticLoader),
            root.path(),
        );
        let process_id = ctx.process_id.clone();

        // ACT: run the listener in the background until the task completes
        let listener_handle = {
            let ctx = ctx.clone();
            tokio::spawn(async move { listener::run(&ctx).await })
        };

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let task_done = registry
                .task_snapshot(&task_id)
                .map(|task| task.status == TaskStatus::Completed)
                .unwrap_or(false);
            let worker_idle = registry
                .process_snapshot(&process_id)
                .map(|process| process.status == ProcessStatus::Idle)
                .unwrap_or(false);
            if task_done && worker_idle {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "listener did not complete the task in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // ASSERT
        let snapshot = registry.task_snapshot(&task_id).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.locked_by, None);

        listener_handle.abort();
    }

    // ============================================================
    // TEST 8: argv contract
    // ============================================================

    #[test]
    fn test_stage_argv_shapes_are_bit_exact() {
        let storage = StorageContext::new("/data");
        let paths = storage.task_paths(&TaskId("t1".to_string()));
        let dataset = storage.dataset_path(&DatasetId("housing".to_string()), "");

        assert_eq!(
            StageCommand::Train.argv("/mnt/host", &paths, &dataset),
            vec![
                "train",
                "--data",
                "/mnt/host/data/datasets/housing/default/train",
                "--conf",
                "/mnt/host/data/tasks/t1/config/config.json",
                "--output",
                "/mnt/host/data/tasks/t1/parameters",
            ]
        );

        assert_eq!(
            StageCommand::Predict { split: Split::Val }.argv("/mnt/host", &paths, &dataset),
            vec![
                "predict",
                "--data",
                "/mnt/host/data/datasets/housing/default/val",
                "--memory",
                "/mnt/host/data/tasks/t1/parameters",
                "--output",
                "/mnt/host/data/tasks/t1/predictions/val",
            ]
        );

        assert_eq!(
            StageCommand::Eval { split: Split::Train }.argv("/mnt/host", &paths, &dataset),
            vec![
                "eval",
                "--actual",
                "/mnt/host/data/datasets/housing/default/train",
                "--predicted",
                "/mnt/host/data/tasks/t1/predictions/train",
            ]
        );
    }

    // ============================================================
    // TEST 9: evaluator output parsing
    // ============================================================

    #[test]
    fn test_parse_quality_takes_final_line() {
        let (quality, preceding) = parse_quality("step 1\nstep 2\n0.5\n").unwrap();
        assert_eq!(quality, 0.5);
        assert_eq!(preceding, "step 1\nstep 2");
    }

    #[test]
    fn test_parse_quality_ignores_trailing_blank_lines() {
        let (quality, preceding) = parse_quality("log line\n0.75\n\n\n").unwrap();
        assert_eq!(quality, 0.75);
        assert_eq!(preceding, "log line");
    }

    #[test]
    fn test_parse_quality_trims_whitespace_around_score() {
        let (quality, _) = parse_quality("  0.25  \n").unwrap();
        assert_eq!(quality, 0.25);
    }

    #[test]
    fn test_parse_quality_score_only_output() {
        let (quality, preceding) = parse_quality("1.0\n").unwrap();
        assert_eq!(quality, 1.0);
        assert_eq!(preceding, "");
    }

    #[test]
    fn test_parse_quality_rejects_non_numeric_final_line() {
        let err = parse_quality("log\nnot-a-number\n").unwrap_err();
        assert!(format!("{:#}", err).contains("not a quality score"));
    }

    #[test]
    fn test_parse_quality_rejects_empty_output() {
        let err = parse_quality("").unwrap_err();
        assert!(format!("{:#}", err).contains("produced no output"));

        let err = parse_quality("\n\n").unwrap_err();
        assert!(format!("{:#}", err).contains("produced no output"));
    }
}
