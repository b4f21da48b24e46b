use std::sync::Arc;
use std::time::Duration;

use crate::modules::{ContainerRuntime, ImageLoader};
use crate::registry::adapter::RegistryHandle;
use crate::registry::types::ProcessId;
use crate::storage::StorageContext;

/// Process-wide state of one worker, threaded explicitly into every
/// operation: the worker's identity, its poll period, the mount prefix for
/// container argv paths, and handles to the external collaborators.
#[derive(Clone)]
pub struct WorkerContext {
    pub process_id: ProcessId,
    pub period: Duration,
    pub mount_prefix: String,
    pub registry: RegistryHandle,
    pub storage: StorageContext,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub loader: Arc<dyn ImageLoader>,
}
