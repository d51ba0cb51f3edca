//! Per-request extraction state.

use std::time::{Duration, Instant};

use codeforge_core::{ArtifactSet, LineReassembler, SessionStatus};
use tracing::debug;
use uuid::Uuid;

use crate::boundary::{BoundaryMachine, BoundaryState, Transition};

/// State of one generation request, owned by a single task.
#[derive(Debug)]
pub struct ExtractionSession {
    id: String,
    project_id: String,
    lines: LineReassembler,
    machine: BoundaryMachine,
    bytes_received: usize,
    status: SessionStatus,
    started_at: Instant,
}

impl ExtractionSession {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            lines: LineReassembler::new(),
            machine: BoundaryMachine::new(),
            bytes_received: 0,
            status: SessionStatus::Running,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Cumulative bytes fed so far.
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn boundary_state(&self) -> BoundaryState {
        self.machine.state()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Feed one chunk of upstream text; returns a transition per completed line.
    pub fn feed(&mut self, chunk: &str) -> Vec<Transition> {
        self.bytes_received += chunk.len();
        self.lines
            .feed(chunk)
            .iter()
            .map(|line| self.machine.process_line(line))
            .collect()
    }

    /// Flush the pending fragment, seal any open artifact and hand over
    /// everything captured.
    ///
    /// The returned transitions cover the flushed final line, if any.
    pub fn finish(&mut self) -> (Vec<Transition>, ArtifactSet) {
        let transitions = match self.lines.flush() {
            Some(line) => {
                debug!(session_id = %self.id, "Flushing unterminated final line");
                vec![self.machine.process_line(&line)]
            }
            None => Vec::new(),
        };
        (transitions, self.machine.finish())
    }

    /// Move to a terminal status. A terminal status is never left.
    pub fn conclude(&mut self, status: SessionStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}
