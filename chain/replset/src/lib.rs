//! The replica-set coordinator: membership, election, heartbeat,
//! apply loop, rollback, the write-concern progress reporter, and ghost
//! sync for chained secondaries. Networking is abstracted behind
//! the `SyncSource`/`ConnectionPool` traits and types so the decision logic
//! here is exercised without any real sockets; `server/dbnode` supplies the
//! wire-connected implementations.

pub mod apply_loop;
pub mod config;
pub mod coordinator;
pub mod election;
pub mod ghost_sync;
pub mod heartbeat;
pub mod initial_sync;
pub mod member;
pub mod reporter;
pub mod rollback;

pub use config::{MemberConfig, ReplSetConfig};
pub use coordinator::{Coordinator, PeerView};
pub use election::{Ballot, ElectionRound, VoteRequest};
pub use member::MemberState;
