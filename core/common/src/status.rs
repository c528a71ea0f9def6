use std::fmt;

/// Stable, closed taxonomy of error codes. Numbers are part of the wire
/// contract: clients and replicas match on them, so existing variants are
/// never renumbered, only added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    /// Malformed input that could never have succeeded, e.g. a bad decimal string.
    BadValue = 2,
    /// Duplicate value in a unique index.
    DuplicateKey = 11000,
    /// Operation was interrupted via `killOp`.
    Interrupted = 11601,
    /// Caller's shard/collection version is stale relative to the target's.
    StaleConfig = 13388,
    /// A document lacked the field(s) a shard key pattern requires.
    ShardKeyNotFound = 61,
    /// An operand was of a type the operation cannot act on.
    TypeMismatch = 14,
    /// Lock could not be acquired before its timeout elapsed.
    LockTimeout = 24,
    /// A write conflicted with a concurrent transaction and must be retried.
    WriteConflict = 112,
    /// The node servicing the op is not (or no longer) primary for its set.
    NotMaster = 10107,
    /// A deadline passed before the operation completed.
    ExceededTimeLimit = 50,
    /// A replica-set reconfiguration target rejected a proposed config.
    InvalidReplicaSetConfig = 93,
    /// A tailing cursor's position was truncated out of the capped log.
    CursorNotFound = 43,
    /// Invariant violated on a path that is not supposed to be reachable.
    AssertionFailure = 50000,
    /// Process is shutting down; all operations are being interrupted.
    InterruptedAtShutdown = 11600,
}

impl ErrorCode {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCode::StaleConfig
                | ErrorCode::LockTimeout
                | ErrorCode::WriteConflict
                | ErrorCode::NotMaster
                | ErrorCode::Interrupted
        )
    }
}

/// A `{code, message}` pair, the shape every wire error reply carries.
///
/// Distinguished from a panic: a `Status` always means "this specific
/// operation failed", never "the process is in an undefined state".
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{code:?}: {message}")]
pub struct Status {
    pub code: ErrorCode,
    pub message: String,
}

impl Status {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Status { code, message: message.into() }
    }

    pub fn ok() -> Self {
        Status { code: ErrorCode::Ok, message: String::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }

    pub fn stale_config(reason: impl Into<String>) -> Self {
        Status::new(ErrorCode::StaleConfig, reason)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}
