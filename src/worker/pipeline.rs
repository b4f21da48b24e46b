//! Pipeline Driver
//!
//! Walks one claimed task through the stage state machine:
//!
//! | From stage | Action | Next stage |
//! |---|---|---|
//! | begin | mark stage=training | training |
//! | training | train executor | predicting |
//! | predicting | predict executor over train, then val | evaluating |
//! | evaluating | eval executor over train, then val; persist qualities | end |
//! | end | mark status=completed; run reaper | (terminal) |
//!
//! Between stages the driver re-reads the task's live status from the
//! registry; a stage only runs while the status is still `running`, so
//! externally requested pauses and terminations are honoured at the next
//! stage boundary. Stage commits are durable, idempotent registry writes made
//! after the stage's outputs exist on disk, which is what makes a crash
//! between work and commit safe: the interrupted stage simply re-runs on the
//! next claim and overwrites its outputs in place.

use anyhow::Result;

use crate::registry::types::{ModuleKind, Split, Task, TaskFields, TaskStage, TaskStatus};

use super::context::WorkerContext;
use super::reaper;
use super::stages::{self, StageOutcome};

/// Runs the full pipeline for one claimed task.
///
/// Stage-local failures are absorbed after the task has been committed to
/// `Error`; the returned error strictly means a fatal filesystem condition,
/// in which case the lock is deliberately left for the registry's TTL to
/// reclaim (the supervisor restarts the process).
pub async fn run_task(ctx: &WorkerContext, mut task: Task) -> Result<()> {
    drive(ctx, &mut task).await?;

    // External-intervention handler: whatever was observed last decides the
    // terminal state. Statuses like completed or error need no further
    // mutation.
    match task.status {
        TaskStatus::Terminating => {
            ctx.registry
                .update_task_status(&task.id, TaskStatus::Terminated, "")
                .await;
        }
        TaskStatus::Pausing => {
            ctx.registry
                .update_task_status(&task.id, TaskStatus::Paused, "")
                .await;
        }
        _ => {}
    }

    ctx.registry.unlock_task(&task.id, &ctx.process_id).await;
    Ok(())
}

async fn drive(ctx: &WorkerContext, task: &mut Task) -> Result<()> {
    let registry = &ctx.registry;

    // Mark the task as running.
    registry
        .update_task_status(&task.id, TaskStatus::Running, "")
        .await;
    task.status = TaskStatus::Running;

    let dataset_path = ctx.storage.dataset_path(&task.dataset, "");
    let paths = ctx.storage.task_paths(&task.id);

    // Ensure the task model is loaded. Only needed if the task has not
    // arrived at the evaluation stage yet.
    let model_image = if task.stage != TaskStage::Evaluating {
        let image_path = ctx.storage.module_image_path(&task.model, ModuleKind::Model);
        match ctx.loader.load(&image_path).await {
            Ok(name) => name,
            Err(e) => {
                tracing::error!(
                    module_id = %task.model,
                    task_id = %task.id,
                    "MODEL LOAD ERROR: {:#}",
                    e
                );
                registry
                    .update_task_status(&task.id, TaskStatus::Error, &format!("{:#}", e))
                    .await;
                task.status = TaskStatus::Error;
                return Ok(());
            }
        }
    } else {
        String::new()
    };

    paths.ensure_dirs().await?;

    // Put the task in the training stage.
    if task.stage == TaskStage::Begin {
        registry
            .update_task_stage(&task.id, TaskStage::Training)
            .await;
        task.stage = TaskStage::Training;
    } else {
        tracing::info!(
            task_id = %task.id,
            model = %task.model,
            dataset = %task.dataset,
            objective = %task.objective,
            "TASK NOT IN BEGIN STAGE"
        );
    }

    // Check the task status as it is maybe not running anymore.
    task.status = registry.get_task(&task.id).await.status;

    // Run the training stage if the task is still running.
    if task.status == TaskStatus::Running {
        if task.stage == TaskStage::Training {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL TRAINING STARTED"
            );

            match stages::run_train(ctx, task, &model_image, &paths, &dataset_path).await? {
                StageOutcome::Failed => {
                    task.status = TaskStatus::Error;
                    return Ok(());
                }
                StageOutcome::Completed => {}
            }

            registry
                .update_task_stage(&task.id, TaskStage::Predicting)
                .await;
            task.stage = TaskStage::Predicting;

            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL TRAINING COMPLETED"
            );
        } else {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL TRAINING SKIPPED"
            );
        }
    }

    // Check the task status as it is maybe not running anymore.
    task.status = registry.get_task(&task.id).await.status;

    // Run the predicting stage if the task is still running.
    if task.status == TaskStatus::Running {
        if task.stage == TaskStage::Predicting {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL PREDICTING STARTED"
            );

            for split in [Split::Train, Split::Val] {
                match stages::run_predict(ctx, task, &model_image, split, &paths, &dataset_path)
                    .await?
                {
                    StageOutcome::Failed => {
                        task.status = TaskStatus::Error;
                        return Ok(());
                    }
                    StageOutcome::Completed => {}
                }
            }

            registry
                .update_task_stage(&task.id, TaskStage::Evaluating)
                .await;
            task.stage = TaskStage::Evaluating;

            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL PREDICTING COMPLETED"
            );
        } else {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL PREDICTING SKIPPED"
            );
        }
    }

    // Check the task status as it is maybe not running anymore.
    task.status = registry.get_task(&task.id).await.status;

    // Run the evaluation stage if the task is still running.
    if task.status == TaskStatus::Running {
        if task.stage == TaskStage::Evaluating {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL EVALUATING STARTED"
            );

            // Ensure the task objective is loaded.
            let objective_path = ctx
                .storage
                .module_image_path(&task.objective, ModuleKind::Objective);
            let objective_image = match ctx.loader.load(&objective_path).await {
                Ok(name) => name,
                Err(e) => {
                    tracing::error!(
                        module_id = %task.objective,
                        task_id = %task.id,
                        "OBJECTIVE LOAD ERROR: {:#}",
                        e
                    );
                    registry
                        .update_task_status(&task.id, TaskStatus::Error, &format!("{:#}", e))
                        .await;
                    task.status = TaskStatus::Error;
                    return Ok(());
                }
            };

            let Some(train_quality) =
                stages::run_eval(ctx, task, &objective_image, Split::Train, &paths, &dataset_path)
                    .await?
            else {
                task.status = TaskStatus::Error;
                return Ok(());
            };

            let Some(val_quality) =
                stages::run_eval(ctx, task, &objective_image, Split::Val, &paths, &dataset_path)
                    .await?
            else {
                task.status = TaskStatus::Error;
                return Ok(());
            };

            // Update the task quality.
            registry
                .update_task(
                    &task.id,
                    &TaskFields {
                        quality: Some(val_quality),
                        quality_train: Some(train_quality),
                    },
                )
                .await;
            task.quality = Some(val_quality);
            task.quality_train = Some(train_quality);

            registry.update_task_stage(&task.id, TaskStage::End).await;
            task.stage = TaskStage::End;

            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL EVALUATING COMPLETED"
            );
        } else {
            tracing::info!(
                task_id = %task.id,
                model = %task.model,
                dataset = %task.dataset,
                objective = %task.objective,
                "MODEL EVALUATING SKIPPED"
            );
        }
    }

    // Check the task status as it is maybe not running anymore.
    task.status = registry.get_task(&task.id).await.status;

    // Complete the task if it is still running.
    if task.status == TaskStatus::Running && task.stage == TaskStage::End {
        registry
            .update_task_status(&task.id, TaskStatus::Completed, "")
            .await;
        task.status = TaskStatus::Completed;

        tracing::info!(
            task_id = %task.id,
            model = %task.model,
            dataset = %task.dataset,
            objective = %task.objective,
            "TASK COMPLETED"
        );

        // Task completion can trigger job completion.
        reaper::handle_task_completion(ctx, task).await;
    }

    Ok(())
}
