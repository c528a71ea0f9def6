//! Per-process operation counters, mirrored into `prometheus` gauges on a
//! periodic flush: plain atomics, no locking, overflow reset rather than a
//! panicking add.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

/// Counters reset to zero once any one of them would otherwise overflow this
/// bound, so a long-lived process never wraps an `i64` counter silently.
const OVERFLOW_RESET_THRESHOLD: u64 = 1 << 60;

#[derive(Default)]
pub struct OpCounters {
    inserts: AtomicU64,
    queries: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    getmores: AtomicU64,
    commands: AtomicU64,
}

impl OpCounters {
    fn bump(counter: &AtomicU64) {
        let prev = counter.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= OVERFLOW_RESET_THRESHOLD {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn got_insert(&self) {
        Self::bump(&self.inserts);
        OP_COUNTER_VEC.with_label_values(&["insert"]).inc();
    }
    pub fn got_query(&self) {
        Self::bump(&self.queries);
        OP_COUNTER_VEC.with_label_values(&["query"]).inc();
    }
    pub fn got_update(&self) {
        Self::bump(&self.updates);
        OP_COUNTER_VEC.with_label_values(&["update"]).inc();
    }
    pub fn got_delete(&self) {
        Self::bump(&self.deletes);
        OP_COUNTER_VEC.with_label_values(&["delete"]).inc();
    }
    pub fn got_getmore(&self) {
        Self::bump(&self.getmores);
        OP_COUNTER_VEC.with_label_values(&["getmore"]).inc();
    }
    pub fn got_command(&self) {
        Self::bump(&self.commands);
        OP_COUNTER_VEC.with_label_values(&["command"]).inc();
    }

    pub fn snapshot(&self) -> OpCounterSnapshot {
        OpCounterSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            getmores: self.getmores.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct OpCounterSnapshot {
    pub inserts: u64,
    pub queries: u64,
    pub updates: u64,
    pub deletes: u64,
    pub getmores: u64,
    pub commands: u64,
}

/// Logical/physical network byte counters plus request count, with an
/// overflow counter distinct from the byte counters themselves, tracked
/// separately rather than folded into bytesIn/bytesOut.
#[derive(Default)]
pub struct NetworkCounter {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    requests: AtomicU64,
    overflows: AtomicU64,
}

impl NetworkCounter {
    pub fn hit(&self, bytes_in: u64, bytes_out: u64) {
        if self.bytes_in.fetch_add(bytes_in, Ordering::Relaxed) >= OVERFLOW_RESET_THRESHOLD
            || self.bytes_out.fetch_add(bytes_out, Ordering::Relaxed) >= OVERFLOW_RESET_THRESHOLD
        {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            self.bytes_in.store(0, Ordering::Relaxed);
            self.bytes_out.store(0, Ordering::Relaxed);
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        NET_BYTES_IN.inc_by(bytes_in);
        NET_BYTES_OUT.inc_by(bytes_out);
        NET_REQUESTS.inc();
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

pub static GLOBAL_OP_COUNTERS: Lazy<OpCounters> = Lazy::new(OpCounters::default);
pub static NETWORK_COUNTER: Lazy<NetworkCounter> = Lazy::new(NetworkCounter::default);

static ASSERTION_COUNTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "dbcore_assertion_failures_total",
        "Assertion failures bucketed by assertion id",
        &["assertion_id"]
    )
    .expect("metric registration cannot fail twice for the same name")
});

static OP_COUNTER_VEC: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("dbcore_ops_total", "Operations processed by kind", &["op"])
        .expect("metric registration cannot fail twice for the same name")
});

static NET_BYTES_IN: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dbcore_net_bytes_in_total", "Logical bytes read from clients")
        .expect("metric registration cannot fail twice for the same name")
});
static NET_BYTES_OUT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dbcore_net_bytes_out_total", "Logical bytes written to clients")
        .expect("metric registration cannot fail twice for the same name")
});
static NET_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dbcore_net_requests_total", "Requests served")
        .expect("metric registration cannot fail twice for the same name")
});

pub fn record_assertion_failure(id: i32) {
    ASSERTION_COUNTS.with_label_values(&[&id.to_string()]).inc();
}

/// Monotonic counter for fsync/flush cycles.
pub static FLUSH_COUNT: AtomicI64 = AtomicI64::new(0);

pub fn record_flush() {
    FLUSH_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_counters_accumulate_per_kind() {
        let counters = OpCounters::default();
        counters.got_insert();
        counters.got_insert();
        counters.got_query();
        let snap = counters.snapshot();
        assert_eq!(snap.inserts, 2);
        assert_eq!(snap.queries, 1);
        assert_eq!(snap.updates, 0);
    }

    #[test]
    fn op_counter_resets_past_overflow_threshold() {
        let counters = OpCounters::default();
        counters.inserts.store(OVERFLOW_RESET_THRESHOLD - 1, Ordering::Relaxed);
        counters.got_insert();
        assert_eq!(counters.snapshot().inserts, 0);
    }
}
