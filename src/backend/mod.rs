//! Backend boundary: raw row shapes, the realtime stream bridge, and the
//! scripted in-memory stand-in used by the demo runner and tests.

pub mod rows;
pub mod stream;
pub mod stubs;

/// Returns the backend module name for smoke checks.
pub fn module_name() -> &'static str {
    "backend"
}
