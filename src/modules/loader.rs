//! Image Loader
//!
//! Materialises module images from files into references the runtime can
//! start. Loaded images are memoised in a process-global cache; concurrent
//! loads of the same path may both reach docker, but `docker load` is
//! idempotent so the race is harmless.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::process::Command;

#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Loads the image stored at `image_path` and returns its runnable
    /// reference (image name or id).
    async fn load(&self, image_path: &Path) -> Result<String>;
}

/// Production loader shelling out to `docker load`.
pub struct DockerImageLoader {
    docker_bin: String,
    cache: DashMap<PathBuf, String>,
}

impl DockerImageLoader {
    pub fn new() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            cache: DashMap::new(),
        }
    }
}

impl Default for DockerImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageLoader for DockerImageLoader {
    async fn load(&self, image_path: &Path) -> Result<String> {
        if let Some(name) = self.cache.get(image_path) {
            return Ok(name.clone());
        }

        tokio::fs::metadata(image_path)
            .await
            .with_context(|| format!("module image not found at {}", image_path.display()))?;

        let output = Command::new(&self.docker_bin)
            .arg("load")
            .arg("-i")
            .arg(image_path)
            .output()
            .await
            .with_context(|| format!("failed to run docker load for {}", image_path.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "docker load failed for {}: {}",
                image_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let name = parse_loaded_image_name(&stdout).ok_or_else(|| {
            anyhow!(
                "docker load produced no image reference for {}",
                image_path.display()
            )
        })?;

        self.cache.insert(image_path.to_path_buf(), name.clone());
        tracing::debug!("Loaded module image {} as {}", image_path.display(), name);

        Ok(name)
    }
}

/// Extracts the image reference from `docker load` output, which reports
/// either `Loaded image: <name>` or `Loaded image ID: <id>`.
pub(crate) fn parse_loaded_image_name(output: &str) -> Option<String> {
    output.lines().rev().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("Loaded image: ")
            .or_else(|| line.strip_prefix("Loaded image ID: "))
            .map(|name| name.trim().to_string())
    })
}
