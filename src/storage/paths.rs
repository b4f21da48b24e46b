//! Path Service
//!
//! Maps dataset, module, and task identifiers to host-side absolute paths.
//! The layout is deterministic from the identifiers, which is what makes
//! stage re-execution after a crash safe: a re-run overwrites its previous
//! outputs in place.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::registry::types::{DatasetId, ModuleId, ModuleKind, TaskId};

/// System-wide default mode for files the worker persists.
pub const DEFAULT_FILE_PERM: u32 = 0o644;

/// Host-side filesystem layout, rooted at the worker's data directory.
#[derive(Clone)]
pub struct StorageContext {
    data_root: PathBuf,
}

/// The directories a task owns for the duration of its lifetime. The registry
/// lock serialises execution, so no concurrent writer is expected under them.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    pub config: PathBuf,
    pub parameters: PathBuf,
    pub predictions: PathBuf,
    pub evaluations: PathBuf,
    pub logs: PathBuf,
}

impl TaskPaths {
    /// Creates all five task directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.config,
            &self.parameters,
            &self.predictions,
            &self.evaluations,
            &self.logs,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create task directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Path of the config payload handed to the model container.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }
}

impl StorageContext {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Root of a dataset revision. An empty revision selects `default`.
    pub fn dataset_path(&self, dataset: &DatasetId, revision: &str) -> PathBuf {
        let revision = if revision.is_empty() {
            "default"
        } else {
            revision
        };
        self.data_root
            .join("datasets")
            .join(&dataset.0)
            .join(revision)
    }

    /// Location of a module's image file.
    pub fn module_image_path(&self, module: &ModuleId, kind: ModuleKind) -> PathBuf {
        let subtree = match kind {
            ModuleKind::Model => "models",
            ModuleKind::Objective => "objectives",
        };
        self.data_root
            .join("modules")
            .join(subtree)
            .join(&module.0)
            .join("image.tar")
    }

    /// Per-task directory layout.
    pub fn task_paths(&self, task: &TaskId) -> TaskPaths {
        let root = self.data_root.join("tasks").join(&task.0);
        TaskPaths {
            config: root.join("config"),
            parameters: root.join("parameters"),
            predictions: root.join("predictions"),
            evaluations: root.join("evaluations"),
            logs: root.join("logs"),
        }
    }
}

/// Writes `bytes` to `path` with the system-wide default file mode.
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(DEFAULT_FILE_PERM))
            .await
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}
