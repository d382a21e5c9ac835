//! Use case layer: reconcilers, the inbox facade, and app workflows.

pub mod apply_event;
pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod inbox;
pub mod merge_snapshot;
pub mod typing;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
