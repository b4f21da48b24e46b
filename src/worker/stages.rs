//! Stage Executors
//!
//! The three pipeline stages share most of their skeleton: build an argv,
//! start the module container, collect its stdout, classify failures, and
//! persist outputs. That skeleton lives here once, parameterised by
//! [`StageCommand`]; the thin `run_train` / `run_predict` / `run_eval`
//! wrappers add the per-stage input preparation and output handling.
//!
//! Failure classification follows the worker's error policy: container spawn,
//! stdout read, and quality parse failures are stage-local (the task is moved
//! to `Error` and the pipeline short-circuits), while any filesystem write
//! failure is fatal to the process because the registry cannot be trusted to
//! reflect reality without durable stage outputs.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use tokio::io::AsyncReadExt;

use crate::registry::types::{ModuleId, Split, Task, TaskStatus};
use crate::storage::{self, TaskPaths};

use super::context::WorkerContext;

/// Result of a stage-local execution attempt. `Failed` means the task has
/// already been committed to `Error`; the driver stops without touching the
/// remaining stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed,
}

/// Which container invocation a stage performs.
#[derive(Debug, Clone, Copy)]
pub enum StageCommand {
    Train,
    Predict { split: Split },
    Eval { split: Split },
}

impl StageCommand {
    /// The argv handed to the module container. The shapes are bit-exact:
    /// they are the contract user-supplied modules are written against. Every
    /// host path is translated into the container's namespace by prepending
    /// the mount prefix.
    pub fn argv(&self, mount_prefix: &str, paths: &TaskPaths, dataset_path: &Path) -> Vec<String> {
        let mnt = |path: PathBuf| format!("{}{}", mount_prefix, path.display());
        match self {
            StageCommand::Train => vec![
                "train".to_string(),
                "--data".to_string(),
                mnt(dataset_path.join("train")),
                "--conf".to_string(),
                mnt(paths.config_file()),
                "--output".to_string(),
                mnt(paths.parameters.clone()),
            ],
            StageCommand::Predict { split } => vec![
                "predict".to_string(),
                "--data".to_string(),
                mnt(dataset_path.join(split.as_str())),
                "--memory".to_string(),
                mnt(paths.parameters.clone()),
                "--output".to_string(),
                mnt(paths.predictions.join(split.as_str())),
            ],
            StageCommand::Eval { split } => vec![
                "eval".to_string(),
                "--actual".to_string(),
                mnt(dataset_path.join(split.as_str())),
                "--predicted".to_string(),
                mnt(paths.predictions.join(split.as_str())),
            ],
        }
    }

    /// Which module the command runs, and the tag used in its error records.
    fn module<'t>(&self, task: &'t Task) -> (&'t ModuleId, &'static str) {
        match self {
            StageCommand::Eval { .. } => (&task.objective, "OBJECTIVE"),
            _ => (&task.model, "MODEL"),
        }
    }
}

/// Starts the stage container and reads its stdout to completion. On spawn
/// or read failure the task is committed to `Error` and `None` is returned.
async fn run_container_and_collect(
    ctx: &WorkerContext,
    task: &Task,
    image: &str,
    command: &StageCommand,
    paths: &TaskPaths,
    dataset_path: &Path,
) -> Option<Vec<u8>> {
    let (module_id, label) = command.module(task);
    let argv = command.argv(&ctx.mount_prefix, paths, dataset_path);

    let mut reader = match ctx.runtime.run(image, &[], &argv).await {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(
                module_id = %module_id,
                task_id = %task.id,
                "{} CONTAINER START ERROR: {:#}",
                label,
                e
            );
            ctx.registry
                .update_task_status(&task.id, TaskStatus::Error, &format!("{:#}", e))
                .await;
            return None;
        }
    };

    let mut output = Vec::new();
    if let Err(e) = reader.read_to_end(&mut output).await {
        tracing::error!(
            module_id = %module_id,
            task_id = %task.id,
            "{} CONTAINER OUTPUT READ ERROR: {:#}",
            label,
            e
        );
        ctx.registry
            .update_task_status(&task.id, TaskStatus::Error, &e.to_string())
            .await;
        return None;
    }

    Some(output)
}

/// Training stage: writes the task config, runs the model's `train` command,
/// and persists the container output under `logs/train.log`.
pub async fn run_train(
    ctx: &WorkerContext,
    task: &Task,
    image: &str,
    paths: &TaskPaths,
    dataset_path: &Path,
) -> Result<StageOutcome> {
    storage::write_file(&paths.config_file(), task.config.as_bytes()).await?;

    let command = StageCommand::Train;
    let Some(output) = run_container_and_collect(ctx, task, image, &command, paths, dataset_path).await
    else {
        return Ok(StageOutcome::Failed);
    };

    storage::write_file(&paths.logs.join("train.log"), &output).await?;
    Ok(StageOutcome::Completed)
}

/// Prediction stage over one split: runs the model's `predict` command and
/// persists the container output under `logs/predict.<split>.log`.
pub async fn run_predict(
    ctx: &WorkerContext,
    task: &Task,
    image: &str,
    split: Split,
    paths: &TaskPaths,
    dataset_path: &Path,
) -> Result<StageOutcome> {
    let command = StageCommand::Predict { split };
    let Some(output) = run_container_and_collect(ctx, task, image, &command, paths, dataset_path).await
    else {
        return Ok(StageOutcome::Failed);
    };

    storage::write_file(&paths.logs.join(format!("predict.{}.log", split)), &output).await?;
    Ok(StageOutcome::Completed)
}

/// Evaluation stage over one split: runs the objective's `eval` command,
/// parses the final output line as the quality score, and persists all
/// preceding lines under `evaluations/evals.<split>.log`. Returns `None`
/// when the stage failed (the task is already in `Error`).
pub async fn run_eval(
    ctx: &WorkerContext,
    task: &Task,
    image: &str,
    split: Split,
    paths: &TaskPaths,
    dataset_path: &Path,
) -> Result<Option<f64>> {
    let command = StageCommand::Eval { split };
    let Some(output) = run_container_and_collect(ctx, task, image, &command, paths, dataset_path).await
    else {
        return Ok(None);
    };

    let text = String::from_utf8_lossy(&output);
    let (quality, preceding) = match parse_quality(&text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(
                module_id = %task.objective,
                task_id = %task.id,
                "OBJECTIVE QUALITY PARSE ERROR: {:#}",
                e
            );
            ctx.registry
                .update_task_status(&task.id, TaskStatus::Error, &format!("{:#}", e))
                .await;
            return Ok(None);
        }
    };

    storage::write_file(
        &paths.evaluations.join(format!("evals.{}.log", split)),
        preceding.as_bytes(),
    )
    .await?;

    Ok(Some(quality))
}

/// Splits evaluator output into the quality score and the log lines that
/// precede it. The grammar: zero or more arbitrary lines followed by one line
/// holding the score. Output with no non-empty line is a parse error, never
/// a panic.
pub fn parse_quality(output: &str) -> Result<(f64, String)> {
    let lines: Vec<&str> = output.lines().collect();
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("evaluator produced no output"))?;

    let quality = lines[last]
        .trim()
        .parse::<f64>()
        .with_context(|| format!("evaluator output {:?} is not a quality score", lines[last].trim()))?;

    Ok((quality, lines[..last].join("\n")))
}
