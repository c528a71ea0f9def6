//! The migration engine: chunk cloning, critical section, and
//! cut-over. Donor-driven and pull-based — the recipient polls
//! the donor for clone batches and transfer-mods rather than the donor
//! pushing.

pub mod donor;
pub mod locator_set;
pub mod mod_log;
pub mod recipient;
pub mod session;

pub use donor::{DonorMachine, DonorState};
pub use locator_set::LocatorSet;
pub use mod_log::{ModLog, TransferModsBatch, MEMORY_PRESSURE_ABORT_BYTES};
pub use recipient::{tolerate_duplicate_key, Recipient, RecipientState};
pub use session::MigrationSession;
