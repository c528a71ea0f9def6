//! Shared error taxonomy, status codes and assertion helpers used across the
//! router, shard data node and config catalog. Grounded on the closed,
//! numbered error enums of a production document database core: user errors
//! get stable codes and never crash the process, assertion failures bump a
//! counter and convert to a client-visible error, fatal errors exit.

pub mod counters;
pub mod status;

pub use status::{ErrorCode, Status};

/// Increment the assertion-failure counter for `id` and log at error level.
///
/// The failure is recoverable (it unwinds to the dispatcher as a `Status`),
/// but it means an invariant the code assumed held did not, so it is worth a
/// dedicated counter bucket distinct from ordinary user errors.
#[macro_export]
macro_rules! invariant {
    ($id:expr, $cond:expr) => {
        if !($cond) {
            $crate::counters::record_assertion_failure($id);
            tracing::error!(assertion_id = $id, expr = stringify!($cond), "invariant violated");
            return Err($crate::Status::new(
                $crate::ErrorCode::AssertionFailure,
                format!("invariant violated: {}", stringify!($cond)),
            ));
        }
    };
}

/// Unrecoverable condition: log, flush, and exit the process. Reserved for
/// corrupted storage metadata, clock skew, and similar unrecoverable states —
/// never used for conditions a retry or a client error can resolve.
#[macro_export]
macro_rules! fassert {
    ($id:expr, $cond:expr) => {
        if !($cond) {
            tracing::error!(assertion_id = $id, expr = stringify!($cond), "fatal assertion");
            $crate::counters::record_assertion_failure($id);
            std::process::abort();
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(x: i32) -> Result<(), Status> {
        invariant!(50001, x > 0);
        Ok(())
    }

    #[test]
    fn invariant_passes_when_condition_holds() {
        assert!(check(1).is_ok());
    }

    #[test]
    fn invariant_fails_with_assertion_failure_code() {
        let err = check(-1).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }
}
