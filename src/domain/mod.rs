//! Domain layer: conversation records, ledgers, and arbitration clocks.

pub mod clock;
pub mod conversation;
pub mod dedup;
pub mod events;
pub mod navlock;
pub mod store;
pub mod unread;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
