//! Trace recording for per-operator spans.
//!
//! A flow that collects execution statistics installs a root [`SpanRecorder`] in
//! its [`ExecContext`](crate::executor::ExecContext). Operators open child spans
//! under it so that events recorded while they run (KV contention in particular)
//! are attributable to that operator alone. The recording is shipped to the
//! coordinator as trace-data metadata.

use crate::kv::TxnId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// One event recorded into a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// The reader waited on another transaction's lock
    Contention {
        key: Vec<u8>,
        txn_id: TxnId,
        duration_nanos: u64,
    },
    Message(String),
}

/// Serializable snapshot of one span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedSpan {
    pub operation: String,
    pub parent_operation: Option<String>,
    pub start_unix_nanos: u64,
    /// `None` while the span is still open
    pub duration_nanos: Option<u64>,
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<TraceEvent>,
    children: Vec<Arc<SpanRecorder>>,
    duration: Option<Duration>,
}

/// A recording span. Children are kept so that a parent's recording includes them.
#[derive(Debug)]
pub struct SpanRecorder {
    operation: String,
    parent_operation: Option<String>,
    started: Instant,
    start_unix_nanos: u64,
    state: Mutex<RecorderState>,
}

impl SpanRecorder {
    /// Start a root recording.
    pub fn root(operation: &str) -> Arc<Self> {
        Arc::new(Self::open(operation, None))
    }

    fn open(operation: &str, parent_operation: Option<String>) -> Self {
        let start_unix_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self {
            operation: operation.to_string(),
            parent_operation,
            started: Instant::now(),
            start_unix_nanos,
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Open a child span whose events are included in this span's recording.
    pub fn child(self: &Arc<Self>, operation: &str) -> Arc<SpanRecorder> {
        let child = Arc::new(Self::open(operation, Some(self.operation.clone())));
        self.state.lock().children.push(Arc::clone(&child));
        child
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn record(&self, event: TraceEvent) {
        self.state.lock().events.push(event);
    }

    pub fn record_contention(&self, key: &[u8], txn_id: TxnId, waited: Duration) {
        self.record(TraceEvent::Contention {
            key: key.to_vec(),
            txn_id,
            duration_nanos: waited.as_nanos() as u64,
        });
    }

    /// Close the span. Later calls keep the first duration.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.duration.is_none() {
            state.duration = Some(self.started.elapsed());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().duration.is_some()
    }

    /// This span followed by all descendants, depth first.
    pub fn recording(&self) -> Vec<RecordedSpan> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<RecordedSpan>) {
        let (snapshot, children) = {
            let state = self.state.lock();
            let snapshot = RecordedSpan {
                operation: self.operation.clone(),
                parent_operation: self.parent_operation.clone(),
                start_unix_nanos: self.start_unix_nanos,
                duration_nanos: state.duration.map(|d| d.as_nanos() as u64),
                events: state.events.clone(),
            };
            (snapshot, state.children.clone())
        };
        out.push(snapshot);
        for child in children {
            child.collect_into(out);
        }
    }

    /// Total time spent waiting on contention across this span and its descendants.
    pub fn cumulative_contention_time(&self) -> Duration {
        contention_time(&self.recording())
    }
}

/// Sum the contention events of a recording.
pub fn contention_time(recording: &[RecordedSpan]) -> Duration {
    let nanos: u64 = recording
        .iter()
        .flat_map(|span| span.events.iter())
        .map(|event| match event {
            TraceEvent::Contention { duration_nanos, .. } => *duration_nanos,
            TraceEvent::Message(_) => 0,
        })
        .sum();
    Duration::from_nanos(nanos)
}

/// Operator-scoped span: a recorder plus a `tracing` span for log attribution.
#[derive(Debug)]
pub struct OperatorSpan {
    recorder: Arc<SpanRecorder>,
    span: tracing::Span,
}

impl OperatorSpan {
    pub(crate) fn new(recorder: Arc<SpanRecorder>) -> Self {
        let span = tracing::debug_span!(target: "colscan", "operator", name = recorder.operation());
        Self { recorder, span }
    }

    pub fn recorder(&self) -> &Arc<SpanRecorder> {
        &self.recorder
    }

    /// `tracing` span to enter while the operator does work.
    pub fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn finish(self) {
        self.recorder.finish();
    }
}
