//! `EngineContext` - process-scoped replacement for the original driver's
//! single global signalling-module state (§9 redesign).
//!
//! Rather than one process-wide mutable global, every span is attached to
//! an explicit `EngineContext` value the caller owns. Two engines (e.g. two
//! independent test fixtures in the same process) can coexist without
//! sharing state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use isdn_wire::SpanId;

use crate::span::SpanHandle;

/// Shared, cross-span bookkeeping: which spans exist, grouped for NFAS
/// D-channel backup and span-restart fan-out.
#[derive(Default)]
struct Inner {
    spans: HashMap<SpanId, SpanHandle>,
}

/// Cloneable handle to the shared engine context. Clones refer to the same
/// underlying table; dropping all clones drops the table.
#[derive(Clone, Default)]
pub struct EngineContext {
    inner: Arc<Mutex<Inner>>,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_span(&self, span_id: SpanId, handle: SpanHandle) {
        self.inner
            .lock()
            .expect("engine context poisoned")
            .spans
            .insert(span_id, handle);
    }

    pub fn unregister_span(&self, span_id: SpanId) {
        self.inner.lock().expect("engine context poisoned").spans.remove(&span_id);
    }

    pub fn span(&self, span_id: SpanId) -> Option<SpanHandle> {
        self.inner.lock().expect("engine context poisoned").spans.get(&span_id).cloned()
    }

    pub fn span_ids(&self) -> Vec<SpanId> {
        self.inner.lock().expect("engine context poisoned").spans.keys().copied().collect()
    }

    pub fn span_count(&self) -> usize {
        self.inner.lock().expect("engine context poisoned").spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EventQueue;

    #[test]
    fn register_and_look_up_a_span() {
        let ctx = EngineContext::new();
        let handle = SpanHandle::new(1, EventQueue::bounded(4));
        ctx.register_span(1, handle);
        assert!(ctx.span(1).is_some());
        assert_eq!(ctx.span_count(), 1);
    }

    #[test]
    fn unregister_removes_the_span() {
        let ctx = EngineContext::new();
        ctx.register_span(1, SpanHandle::new(1, EventQueue::bounded(4)));
        ctx.unregister_span(1);
        assert!(ctx.span(1).is_none());
    }

    #[test]
    fn two_contexts_are_independent() {
        let a = EngineContext::new();
        let b = EngineContext::new();
        a.register_span(1, SpanHandle::new(1, EventQueue::bounded(4)));
        assert!(a.span(1).is_some());
        assert!(b.span(1).is_none());
    }
}
