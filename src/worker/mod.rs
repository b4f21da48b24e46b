//! Task Execution Engine
//!
//! The worker claims ready tasks from the shared registry and drives each one
//! through the fixed pipeline: train -> predict -> evaluate -> complete.
//!
//! ## Execution Model
//! The worker is one of many peer processes polling the same registry.
//! Claims go through an atomic lock tagged with the worker's process id, so
//! each task is executed by exactly one worker. Within a worker, execution is
//! strictly sequential: the listener does not claim another task until the
//! current one has released its lock.
//!
//! Between stages the driver re-reads the task's live status, which is where
//! external intervention (pause/terminate requests from the API layer) is
//! observed. In-flight containers are never interrupted; intervention takes
//! effect at the next re-check.
//!
//! ## Submodules
//! - **`context`**: process-wide state threaded into every operation.
//! - **`listener`**: the claim loop and process idle/working signal.
//! - **`pipeline`**: the per-task stage state machine.
//! - **`stages`**: the shared container-execution primitive behind the three
//!   stage executors.
//! - **`reaper`**: the job-completion cascade fired when a task completes.

pub mod context;
pub mod listener;
pub mod pipeline;
pub mod reaper;
pub mod stages;

#[cfg(test)]
mod tests;

pub use context::WorkerContext;
