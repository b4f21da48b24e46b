//! Filesystem Storage Module
//!
//! Owns the host-side filesystem layout the worker reads and writes:
//! dataset roots, module image files, and the per-task directory tree
//! (config, parameters, predictions, evaluations, logs).
//!
//! ## Core Concepts
//! - **Deterministic layout**: every path derives from a registry identifier,
//!   so a restarted worker resolves the same locations and stage re-execution
//!   overwrites in place.
//! - **Ownership**: a task's directories are mutated only by the lock holder.
//! - **Permission policy**: persisted files carry the system-wide default
//!   mode (`DEFAULT_FILE_PERM`).

pub mod paths;


pub use paths::{write_file, StorageContext, TaskPaths, DEFAULT_FILE_PERM};
