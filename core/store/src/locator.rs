use std::fmt;

/// Opaque, totally ordered handle to a physical record within a single
/// storage engine. Two locators compare equal iff they name the same
/// physical record; ordering otherwise carries no meaning beyond what the
/// engine chooses (e.g. insertion order for the in-memory engine, RocksDB
/// key order for the RocksDB-backed one) — callers must not infer document
/// content from locator order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordLocator(u64);

impl RecordLocator {
    pub fn new(raw: u64) -> Self {
        RecordLocator(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc:{}", self.0)
    }
}

/// Monotone allocator for record locators within one record store. Engines
/// that derive locators from something else (e.g. a RocksDB key) do not use
/// this; it backs the in-memory reference engine.
#[derive(Debug, Default)]
pub struct LocatorAllocator {
    next: std::sync::atomic::AtomicU64,
}

impl LocatorAllocator {
    pub fn alloc(&self) -> RecordLocator {
        let raw = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        RecordLocator::new(raw)
    }
}
