//! Restore engine: unpack the archive, reconcile the target database to a
//! restorable state, stream the dump in, and guarantee cleanup.
//!
//! The reconciliation logic lives in [`engine`] as an explicit state
//! machine; [`sessions`] holds the auxiliary session-termination operation
//! that is deliberately not wired into the automatic flow.

mod engine;
pub(crate) mod sessions;

pub use engine::{run_restore, RestoreOutcome};
pub use sessions::terminate_sessions;
