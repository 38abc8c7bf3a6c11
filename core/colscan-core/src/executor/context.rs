//! Execution contexts: per-flow configuration, per-statement evaluation state,
//! and the cancellable context threaded through operator calls.

use crate::catalog::{TypeRegistry, TypeResolver};
use crate::config::ScanSettings;
use crate::error::{ColScanError, ColScanResult};
use crate::executor::trace::{OperatorSpan, SpanRecorder, TraceEvent};
use crate::kv::{InMemoryRangeCache, NodeId, RangeCache, Timestamp, Transaction};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Context passed to every operator call.
///
/// Cloning shares the cancellation flag. Fetchers check it at I/O boundaries;
/// operators never poll it themselves.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    cancelled: Arc<AtomicBool>,
    span: Option<Arc<SpanRecorder>>,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose operators record into `span`.
    pub fn with_recording(mut self, span: Arc<SpanRecorder>) -> Self {
        self.span = Some(span);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self) -> ColScanResult<()> {
        if self.is_cancelled() {
            Err(ColScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn span(&self) -> Option<&Arc<SpanRecorder>> {
        self.span.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.span.is_some()
    }

    /// Record an event into the current span, if any.
    pub fn record(&self, event: TraceEvent) {
        if let Some(span) = &self.span {
            span.record(event);
        }
    }
}

/// Open a child span for an operator when the context is recording.
///
/// Returns the context the operator should use from now on, plus the span to
/// finish on close. Without a recording the context is returned unchanged.
pub fn processor_span(ctx: &ExecContext, name: &str) -> (ExecContext, Option<OperatorSpan>) {
    match ctx.span() {
        Some(parent) => {
            let child = parent.child(name);
            let child_ctx = ExecContext {
                cancelled: Arc::clone(&ctx.cancelled),
                span: Some(Arc::clone(&child)),
            };
            (child_ctx, Some(OperatorSpan::new(child)))
        }
        None => (ctx.clone(), None),
    }
}

/// Node identity of the executing process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdentity {
    /// A node ID is available. `NodeId(0)` means it has not been assigned yet.
    Assigned(NodeId),
    /// No node ID exists in this deployment (e.g. a multi-tenant SQL pod).
    Unavailable,
}

impl NodeIdentity {
    pub fn optional_node_id(&self) -> Option<NodeId> {
        match self {
            NodeIdentity::Assigned(id) => Some(*id),
            NodeIdentity::Unavailable => None,
        }
    }

    /// An ID slot exists but holds zero.
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, NodeIdentity::Assigned(id) if id.is_uninitialized())
    }
}

/// 플로우 컨텍스트 — state shared by every operator of one flow on one node.
#[derive(Clone)]
pub struct FlowContext {
    pub node_id: NodeIdentity,
    /// The flow runs entirely on the gateway; nothing is distributed
    pub local: bool,
    pub txn: Option<Arc<dyn Transaction>>,
    /// Log every key/value the fetcher reads
    pub trace_kv: bool,
    pub range_cache: Arc<dyn RangeCache>,
    pub type_resolver: Arc<dyn TypeResolver>,
    /// Explicit memory limit for this flow; zero defers to the settings
    pub memory_limit_bytes: u64,
    pub settings: ScanSettings,
}

impl FlowContext {
    pub fn new(node_id: NodeIdentity) -> Self {
        Self {
            node_id,
            local: false,
            txn: None,
            trace_kv: false,
            range_cache: Arc::new(InMemoryRangeCache::new()),
            type_resolver: Arc::new(TypeRegistry::new()),
            memory_limit_bytes: 0,
            settings: ScanSettings::default(),
        }
    }

    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_txn(mut self, txn: Arc<dyn Transaction>) -> Self {
        self.txn = Some(txn);
        self
    }

    pub fn with_range_cache(mut self, cache: Arc<dyn RangeCache>) -> Self {
        self.range_cache = cache;
        self
    }

    pub fn with_type_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.type_resolver = resolver;
        self
    }

    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    pub fn with_trace_kv(mut self, trace_kv: bool) -> Self {
        self.trace_kv = trace_kv;
        self
    }

    /// Memory budget for one operator of this flow.
    pub fn work_mem_limit(&self) -> u64 {
        self.settings.work_mem_limit(self.memory_limit_bytes)
    }
}

/// AS OF SYSTEM TIME clause of the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsOfSystemTime {
    pub timestamp: Timestamp,
    /// Any timestamp at or above `timestamp` is acceptable
    pub bounded_staleness: bool,
    /// Only the nearest replica may serve the read
    pub nearest_only: bool,
    pub max_timestamp_bound: Option<Timestamp>,
}

/// Per-statement evaluation state.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub as_of_system_time: Option<AsOfSystemTime>,
}
