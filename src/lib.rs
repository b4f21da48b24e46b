//! Task Execution Worker Library
//!
//! This library crate defines the core modules of the scheduler's worker
//! daemon. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The worker is composed of four loosely coupled subsystems:
//!
//! - **`registry`**: The shared-state layer. Defines the task/job/process data
//!   model and the registry facade the worker claims tasks from, with an HTTP
//!   backend for production and an in-memory backend for standalone runs and
//!   tests.
//! - **`modules`**: The container collaborators. Wraps the container runtime
//!   (start a user-supplied module image, stream its stdout) and the image
//!   loader that materialises module images from files.
//! - **`storage`**: The filesystem layer. Maps dataset, module, and task
//!   identifiers to host-side paths and owns the file-permission policy.
//! - **`worker`**: The execution engine. The listener claims scheduled tasks,
//!   the pipeline driver walks them through train -> predict -> evaluate ->
//!   complete, and the reaper fires the job-completion cascade.

pub mod modules;
pub mod registry;
pub mod storage;
pub mod worker;
