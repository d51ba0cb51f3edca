//! Progress emission for one extraction session.

use std::sync::Arc;

use codeforge_core::{ProgressEvent, SessionFailure, ValidationFinding};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiver of a session's progress events.
///
/// `deliver` returns `false` once the subscriber is gone; the emitter then
/// stops delivering instead of buffering.
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, event: ProgressEvent) -> bool;
}

/// Sink that discards everything.
pub struct NoOpSink;

impl ProgressSink for NoOpSink {
    fn deliver(&self, _event: ProgressEvent) -> bool {
        true
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn deliver(&self, event: ProgressEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Largest percentage reported before the session completes.
const MAX_RUNNING_PERCENTAGE: u8 = 99;

/// Publishes ordered events to a single subscriber.
///
/// After a terminal event nothing else is published. Progress lengths
/// never decrease.
pub struct ProgressEmitter {
    sink: Arc<dyn ProgressSink>,
    expected_bytes: Option<usize>,
    last_length: usize,
    emitted: usize,
    terminated: bool,
    disconnected: bool,
}

impl ProgressEmitter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            expected_bytes: None,
            last_length: 0,
            emitted: 0,
            terminated: false,
            disconnected: false,
        }
    }

    /// Report a percentage relative to an expected output size.
    pub fn with_expected_bytes(mut self, expected: Option<usize>) -> Self {
        self.expected_bytes = expected.filter(|n| *n > 0);
        self
    }

    pub fn status(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::Status {
            message: message.into(),
        });
    }

    pub fn artifact_started(&mut self, filename: impl Into<String>) {
        self.emit(ProgressEvent::ArtifactStarted {
            filename: filename.into(),
        });
    }

    /// Cumulative bytes received so far.
    pub fn progress(&mut self, length: usize) {
        let length = length.max(self.last_length);
        self.last_length = length;

        let percentage = self.expected_bytes.map(|expected| {
            let pct = length.saturating_mul(100) / expected;
            pct.min(MAX_RUNNING_PERCENTAGE as usize) as u8
        });

        self.emit(ProgressEvent::Progress { length, percentage });
    }

    pub fn validation_failed(&mut self, finding: ValidationFinding) {
        self.emit(ProgressEvent::ValidationFailed(finding));
    }

    /// Terminal success.
    pub fn completed(&mut self, project_id: impl Into<String>, file_count: usize, duration_ms: u128) {
        self.emit(ProgressEvent::Completed {
            project_id: project_id.into(),
            file_count,
            duration: format!("{}ms", duration_ms),
        });
    }

    /// Terminal failure.
    pub fn failed(&mut self, failure: &SessionFailure) {
        self.emit(ProgressEvent::from_failure(failure));
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Events handed to the subscriber.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn emit(&mut self, event: ProgressEvent) {
        if self.terminated {
            warn!(event = event.type_name(), "Dropping event after terminal event");
            return;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        if self.disconnected {
            return;
        }

        if self.sink.deliver(event) {
            self.emitted += 1;
        } else {
            debug!("Progress subscriber went away; dropping further events");
            self.disconnected = true;
        }
    }
}
