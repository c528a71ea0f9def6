//! Per-connection current-op stack: a nested frame per
//! operation in flight, so `currentOp` and the profiler can report the
//! innermost operation along with the chain of commands that led to it
//! (e.g. a `findAndModify` running its own internal query).

use std::time::{Duration, Instant};

use crate::classify::OperationKind;

#[derive(Debug, Clone)]
pub struct OpFrame {
    pub kind: OperationKind,
    pub ns: String,
    pub description: String,
    started_at: Instant,
}

/// Tracks the operations currently executing on one connection as a stack;
/// the top frame is the one actually doing work right now.
#[derive(Default)]
pub struct CurrentOp {
    stack: Vec<OpFrame>,
}

impl CurrentOp {
    pub fn new() -> Self {
        CurrentOp::default()
    }

    pub fn push(&mut self, kind: OperationKind, ns: impl Into<String>, description: impl Into<String>) {
        self.stack.push(OpFrame { kind, ns: ns.into(), description: description.into(), started_at: Instant::now() });
    }

    pub fn pop(&mut self) -> Option<(OpFrame, Duration)> {
        self.stack.pop().map(|frame| {
            let elapsed = frame.started_at.elapsed();
            (frame, elapsed)
        })
    }

    pub fn current(&self) -> Option<&OpFrame> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
