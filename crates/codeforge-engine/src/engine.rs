//! Session driver.
//!
//! Wires the pipeline together for one request:
//! chunk → line reassembly → boundary machine → (stream end) → fallback →
//! validation → commit, publishing progress along the way.

use std::sync::Arc;
use std::time::Duration;

use codeforge_core::config::ExtractionConfig;
use codeforge_core::{SessionFailure, SessionStatus};
use codeforge_providers::{ChunkStream, CompletionRequest, Provider};
use codeforge_store::ArtifactStore;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::boundary::Transition;
use crate::commit::CommitCoordinator;
use crate::emitter::{ProgressEmitter, ProgressSink};
use crate::error::EngineResult;
use crate::fallback::{ensure_entry, FallbackOutcome};
use crate::session::ExtractionSession;
use crate::validate::{ValidationReport, Validator};

/// First event of every session.
pub const STARTING_MESSAGE: &str = "Starting code generation...";

/// Result of one finished session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub project_id: String,
    pub status: SessionStatus,
    /// Artifacts committed; zero unless completed
    pub file_count: usize,
    pub bytes_received: usize,
    pub duration: Duration,
    pub fallback: Option<FallbackOutcome>,
    pub report: Option<ValidationReport>,
    pub failure: Option<SessionFailure>,
}

impl SessionOutcome {
    fn from_session(session: &ExtractionSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            project_id: session.project_id().to_string(),
            status: session.status(),
            file_count: 0,
            bytes_received: session.bytes_received(),
            duration: session.elapsed(),
            fallback: None,
            report: None,
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

/// Streaming extraction engine.
///
/// Holds no provider state; the provider is passed into each call, so one
/// engine serves concurrent sessions for different projects.
pub struct GenerationEngine {
    store: Arc<dyn ArtifactStore>,
    commits: CommitCoordinator,
    config: ExtractionConfig,
}

impl GenerationEngine {
    pub fn new(store: Arc<dyn ArtifactStore>, config: ExtractionConfig) -> Self {
        Self {
            commits: CommitCoordinator::new(store.clone()),
            store,
            config,
        }
    }

    /// Request a generation from `provider` and extract its output.
    ///
    /// Errors are returned only when the session cannot start (unknown
    /// project, grammar load failure). Everything after the first event
    /// ends in a terminal event and an outcome.
    #[instrument(skip(self, provider, request, sink, cancel), fields(provider = provider.id()))]
    pub async fn generate(
        &self,
        project_id: &str,
        provider: &dyn Provider,
        request: CompletionRequest,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> EngineResult<SessionOutcome> {
        let validator = self.prepare(project_id).await?;
        let mut session = ExtractionSession::new(project_id);
        let mut emitter = self.start(&session, sink);

        let stream = match provider.complete_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                let failure = SessionFailure::upstream(e.to_string());
                return Ok(self.fail(&mut session, &mut emitter, failure).await);
            }
        };

        Ok(self.drive(session, emitter, validator, stream, cancel).await)
    }

    /// Extract from an already open chunk stream.
    pub async fn run_stream(
        &self,
        project_id: &str,
        stream: ChunkStream,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> EngineResult<SessionOutcome> {
        let validator = self.prepare(project_id).await?;
        let session = ExtractionSession::new(project_id);
        let emitter = self.start(&session, sink);

        Ok(self.drive(session, emitter, validator, stream, cancel).await)
    }

    async fn prepare(&self, project_id: &str) -> EngineResult<Validator> {
        self.store.get_project(project_id).await?;
        Validator::new(&self.config)
    }

    fn start(&self, session: &ExtractionSession, sink: Arc<dyn ProgressSink>) -> ProgressEmitter {
        info!(session_id = session.id(), project_id = session.project_id(), "Starting generation session");
        let mut emitter = ProgressEmitter::new(sink).with_expected_bytes(self.config.expected_output_bytes);
        emitter.status(STARTING_MESSAGE);
        emitter
    }

    async fn drive(
        &self,
        mut session: ExtractionSession,
        mut emitter: ProgressEmitter,
        mut validator: Validator,
        mut stream: ChunkStream,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session_id = session.id(), "Session cancelled; validating captured output");
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if let Some(delta) = chunk.delta.as_deref() {
                        let transitions = session.feed(delta);
                        announce(&mut emitter, &transitions);
                        emitter.progress(session.bytes_received());
                    }
                    if chunk.is_final {
                        debug!(session_id = session.id(), "Upstream signalled end of message");
                        break;
                    }
                }
                Some(Err(e)) => {
                    let failure = SessionFailure::upstream(e.to_string());
                    return self.fail(&mut session, &mut emitter, failure).await;
                }
                None => {
                    debug!(session_id = session.id(), "Upstream stream closed");
                    break;
                }
            }
        }

        let (transitions, mut set) = session.finish();
        announce(&mut emitter, &transitions);

        info!(
            session_id = session.id(),
            artifacts = set.len(),
            artifact_bytes = set.total_bytes(),
            bytes = session.bytes_received(),
            "Extraction finished"
        );

        let fallback = ensure_entry(&mut set, &self.config.entry_name);

        let report = match validator.validate(&mut set) {
            Ok(report) => report,
            Err(finding) => {
                warn!(session_id = session.id(), %finding, "Validation failed");
                emitter.validation_failed(finding.clone());
                let mut outcome = self
                    .fail(&mut session, &mut emitter, SessionFailure::Validation(finding))
                    .await;
                outcome.fallback = Some(fallback);
                return outcome;
            }
        };

        match self.commits.commit(session.project_id(), session.id(), &set).await {
            Ok(written) => {
                session.conclude(SessionStatus::Completed);
                emitter.completed(session.project_id(), written, session.elapsed().as_millis());

                let mut outcome = SessionOutcome::from_session(&session);
                outcome.file_count = written;
                outcome.fallback = Some(fallback);
                outcome.report = Some(report);
                outcome
            }
            Err(failure) => {
                session.conclude(SessionStatus::Failed);
                emitter.failed(&failure);

                let mut outcome = SessionOutcome::from_session(&session);
                outcome.fallback = Some(fallback);
                outcome.report = Some(report);
                outcome.failure = Some(failure);
                outcome
            }
        }
    }

    async fn fail(
        &self,
        session: &mut ExtractionSession,
        emitter: &mut ProgressEmitter,
        failure: SessionFailure,
    ) -> SessionOutcome {
        error!(
            session_id = session.id(),
            category = ?failure.category(),
            "{}",
            failure
        );

        self.commits
            .record_failure(session.project_id(), session.id(), &failure)
            .await;
        session.conclude(SessionStatus::Failed);
        emitter.failed(&failure);

        let mut outcome = SessionOutcome::from_session(session);
        outcome.failure = Some(failure);
        outcome
    }
}

fn announce(emitter: &mut ProgressEmitter, transitions: &[Transition]) {
    for transition in transitions {
        if let Transition::Opened { name, .. } = transition {
            emitter.artifact_started(name.as_str());
        }
    }
}
