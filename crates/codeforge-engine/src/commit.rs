//! Commit coordinator.
//!
//! Turns a validated artifact set into one atomic store write, and records
//! terminal failures. Store errors never escape as errors: they become an
//! infrastructure failure for the session.

use std::sync::Arc;

use codeforge_core::{ArtifactSet, SessionFailure};
use codeforge_store::{ArtifactStore, CommittedArtifactSet};
use tracing::{error, info, warn};

pub struct CommitCoordinator {
    store: Arc<dyn ArtifactStore>,
}

impl CommitCoordinator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Persist every draft of `set` and mark the project generated.
    ///
    /// Returns the number of artifacts written. On failure nothing is
    /// written and the project is marked failed.
    pub async fn commit(
        &self,
        project_id: &str,
        session_id: &str,
        set: &ArtifactSet,
    ) -> Result<usize, SessionFailure> {
        let record = CommittedArtifactSet::from_artifacts(session_id, set);

        match self.store.commit(project_id, &record).await {
            Ok(written) => {
                info!(project_id, session_id, written, "Artifact set committed");
                Ok(written)
            }
            Err(e) => {
                error!(project_id, session_id, error = %e, "Commit failed; rolled back");
                let failure = SessionFailure::infrastructure(e.to_string());
                self.record_failure(project_id, session_id, &failure).await;
                Err(failure)
            }
        }
    }

    /// Mark the project failed. Errors are logged, not returned, since the
    /// session is already terminal.
    pub async fn record_failure(&self, project_id: &str, session_id: &str, failure: &SessionFailure) {
        if let Err(e) = self
            .store
            .record_failure(project_id, session_id, &failure.to_string())
            .await
        {
            warn!(project_id, session_id, error = %e, "Failed to record session failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codeforge_core::{ArtifactDraft, FailureCategory};
    use codeforge_store::{FileSummary, Project, SqliteArtifactStore, StoreError, StoredFile};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Store whose writes always fail; remembers recorded failures.
    #[derive(Default)]
    struct BrokenStore {
        failures: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn create_project(&self, _name: &str, _description: Option<&str>) -> codeforge_store::Result<Project> {
            Err(StoreError::NotFound("unsupported".into()))
        }
        async fn get_project(&self, id: &str) -> codeforge_store::Result<Project> {
            Err(StoreError::NotFound(id.into()))
        }
        async fn list_projects(&self, _limit: usize) -> codeforge_store::Result<Vec<Project>> {
            Ok(vec![])
        }
        async fn commit(&self, _project_id: &str, _set: &CommittedArtifactSet) -> codeforge_store::Result<usize> {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
        async fn record_failure(&self, _project_id: &str, _session_id: &str, reason: &str) -> codeforge_store::Result<()> {
            self.failures.lock().push(reason.to_string());
            Ok(())
        }
        async fn list_files(&self, _project_id: &str) -> codeforge_store::Result<Vec<FileSummary>> {
            Ok(vec![])
        }
        async fn get_files(&self, _project_id: &str) -> codeforge_store::Result<Vec<StoredFile>> {
            Ok(vec![])
        }
    }

    fn sample_set() -> ArtifactSet {
        let mut set = ArtifactSet::new();
        let mut draft = ArtifactDraft::open("index.html", 0);
        draft.push_line("<!doctype html><html></html>");
        set.push(draft);
        set
    }

    #[tokio::test]
    async fn test_commit_success() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteArtifactStore::new(tmp.path().join("db.sqlite")).unwrap());
        let project = store.create_project("p", None).await.unwrap();

        let coordinator = CommitCoordinator::new(store.clone());
        let written = coordinator.commit(&project.id, "s1", &sample_set()).await.unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.list_files(&project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_infrastructure_error() {
        let store = Arc::new(BrokenStore::default());
        let coordinator = CommitCoordinator::new(store.clone());

        let failure = coordinator.commit("p", "s1", &sample_set()).await.unwrap_err();

        assert_eq!(failure.category(), FailureCategory::InfrastructureError);
        assert!(failure.finding().is_none());
        assert!(failure.to_string().contains("disk full"));
        assert_eq!(store.failures.lock().len(), 1);
    }
}
