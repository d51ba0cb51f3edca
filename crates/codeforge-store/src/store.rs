//! Artifact storage implementation.
//!
//! Provides SQLite-backed storage for projects and the files committed by
//! successful generation sessions.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use codeforge_core::artifact::inferred_kind;
use codeforge_core::config::StorageConfig;
use codeforge_core::{ArtifactSet, ProjectStatus};

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for codeforge_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => codeforge_core::Error::Database(e.to_string()),
            StoreError::Io(e) => codeforge_core::Error::Io(e),
            StoreError::NotFound(id) => codeforge_core::Error::NotFound(id),
        }
    }
}

/// A project owning generated files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    /// Message of the latest failed generation
    pub failure_reason: Option<String>,
    /// Session that last changed the status
    pub last_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One artifact as written by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedArtifact {
    pub name: String,
    /// Inferred kind: the file extension
    pub kind: String,
    pub content: String,
    pub revision: u32,
    /// A later revision of the same name exists in the set
    pub superseded: bool,
}

/// Everything one session commits, written as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedArtifactSet {
    pub session_id: String,
    pub artifacts: Vec<CommittedArtifact>,
}

impl CommittedArtifactSet {
    /// Build the commit record for a validated artifact set.
    pub fn from_artifacts(session_id: impl Into<String>, set: &ArtifactSet) -> Self {
        let artifacts = set
            .drafts()
            .iter()
            .map(|draft| CommittedArtifact {
                name: draft.name.clone(),
                kind: inferred_kind(&draft.name),
                content: draft.content.clone(),
                revision: draft.revision,
                superseded: set.is_superseded(draft),
            })
            .collect();

        Self {
            session_id: session_id.into(),
            artifacts,
        }
    }

    /// Artifacts that are the latest revision of their name.
    pub fn current(&self) -> impl Iterator<Item = &CommittedArtifact> {
        self.artifacts.iter().filter(|a| !a.superseded)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Listing entry for a generated file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: i64,
    pub filename: String,
    pub file_type: String,
    pub revision: u32,
    pub superseded: bool,
    pub byte_length: usize,
    pub created_at: DateTime<Utc>,
}

/// A generated file with its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub file_path: String,
    pub file_type: String,
    pub content: String,
    pub revision: u32,
    pub superseded: bool,
}

/// Storage trait for abstraction over storage backends.
///
/// `commit` and `record_failure` are the only writes a generation session
/// performs; both are atomic per call.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create a new project.
    async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project>;

    /// Get a project by ID.
    async fn get_project(&self, id: &str) -> Result<Project>;

    /// List projects, most recently updated first.
    async fn list_projects(&self, limit: usize) -> Result<Vec<Project>>;

    /// Replace the project's files with `set` and mark it generated.
    ///
    /// All rows and the status update are written in one transaction;
    /// nothing is visible if any write fails. Returns the number of rows.
    async fn commit(&self, project_id: &str, set: &CommittedArtifactSet) -> Result<usize>;

    /// Mark the project failed without touching its files.
    async fn record_failure(&self, project_id: &str, session_id: &str, reason: &str) -> Result<()>;

    /// List a project's generated files.
    async fn list_files(&self, project_id: &str) -> Result<Vec<FileSummary>>;

    /// Get a project's generated files with content.
    async fn get_files(&self, project_id: &str) -> Result<Vec<StoredFile>>;
}

/// SQLite-backed artifact storage.
pub struct SqliteArtifactStore {
    /// Database connection; the mutex serialises writers.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteArtifactStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.run_migrations()?;

        Ok(store)
    }

    /// Open the store configured in `[storage]`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config.resolve_database_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();

        // schema_version does not exist before the first migration
        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            debug!("Applying initial schema migration");
            conn.execute_batch(include_str!("../migrations/001_initial.sql"))?;
        }

        Ok(())
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
        let status: String = row.get(3)?;
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            status: ProjectStatus::parse(&status).unwrap_or(ProjectStatus::Created),
            failure_reason: row.get(4)?,
            last_session_id: row.get(5)?,
            created_at: Self::parse_datetime(&row.get::<_, String>(6)?),
            updated_at: Self::parse_datetime(&row.get::<_, String>(7)?),
        })
    }

    fn ensure_project(conn: &Connection, project_id: &str) -> Result<()> {
        let exists = conn
            .query_row("SELECT 1 FROM projects WHERE id = ?1", params![project_id], |_| Ok(()))
            .optional()?;
        exists.ok_or_else(|| StoreError::NotFound(project_id.to_string()))
    }
}

const PROJECT_COLUMNS: &str =
    "id, name, description, status, failure_reason, last_session_id, created_at, updated_at";

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            status: ProjectStatus::Created,
            failure_reason: None,
            last_session_id: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO projects (id, name, description, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                project.id,
                project.name,
                project.description,
                project.status.as_str(),
                Self::format_datetime(&project.created_at),
                Self::format_datetime(&project.updated_at),
            ],
        )?;

        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
            params![id],
            Self::project_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_projects(&self, limit: usize) -> Result<Vec<Project>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM projects ORDER BY updated_at DESC LIMIT ?1",
            PROJECT_COLUMNS
        ))?;
        let projects = stmt
            .query_map(params![limit as i64], Self::project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    async fn commit(&self, project_id: &str, set: &CommittedArtifactSet) -> Result<usize> {
        let mut conn = self.conn.lock();
        let now = Self::format_datetime(&Utc::now());

        // Dropping the transaction on any early return rolls it back
        let tx = conn.transaction()?;
        Self::ensure_project(&tx, project_id)?;

        let replaced = tx.execute(
            "DELETE FROM generated_files WHERE project_id = ?1",
            params![project_id],
        )?;

        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO generated_files (
                    project_id, session_id, filename, file_path, file_type,
                    content, revision, superseded, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;

            for artifact in &set.artifacts {
                insert.execute(params![
                    project_id,
                    set.session_id,
                    artifact.name,
                    artifact.name,
                    artifact.kind,
                    artifact.content,
                    artifact.revision,
                    artifact.superseded,
                    now,
                ])?;
            }
        }

        tx.execute(
            r#"
            UPDATE projects SET
                status = ?2, failure_reason = NULL, last_session_id = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![project_id, ProjectStatus::Generated.as_str(), set.session_id, now],
        )?;

        tx.commit()?;

        info!(
            project_id,
            session_id = %set.session_id,
            files = set.len(),
            replaced,
            "Committed generated files"
        );

        Ok(set.len())
    }

    async fn record_failure(&self, project_id: &str, session_id: &str, reason: &str) -> Result<()> {
        let conn = self.conn.lock();

        let rows = conn.execute(
            r#"
            UPDATE projects SET
                status = ?2, failure_reason = ?3, last_session_id = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                project_id,
                ProjectStatus::Failed.as_str(),
                reason,
                session_id,
                Self::format_datetime(&Utc::now()),
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(project_id.to_string()));
        }

        Ok(())
    }

    async fn list_files(&self, project_id: &str) -> Result<Vec<FileSummary>> {
        let conn = self.conn.lock();
        Self::ensure_project(&conn, project_id)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, filename, file_type, revision, superseded, length(CAST(content AS BLOB)), created_at
            FROM generated_files
            WHERE project_id = ?1
            ORDER BY id
            "#,
        )?;

        let files = stmt
            .query_map(params![project_id], |row| {
                Ok(FileSummary {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    file_type: row.get(2)?,
                    revision: row.get(3)?,
                    superseded: row.get(4)?,
                    byte_length: row.get::<_, i64>(5)? as usize,
                    created_at: Self::parse_datetime(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(files)
    }

    async fn get_files(&self, project_id: &str) -> Result<Vec<StoredFile>> {
        let conn = self.conn.lock();
        Self::ensure_project(&conn, project_id)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT filename, file_path, file_type, content, revision, superseded
            FROM generated_files
            WHERE project_id = ?1
            ORDER BY id
            "#,
        )?;

        let files = stmt
            .query_map(params![project_id], |row| {
                Ok(StoredFile {
                    filename: row.get(0)?,
                    file_path: row.get(1)?,
                    file_type: row.get(2)?,
                    content: row.get(3)?,
                    revision: row.get(4)?,
                    superseded: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_core::ArtifactDraft;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteArtifactStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteArtifactStore::new(temp_dir.path().join("codeforge.db")).unwrap();
        (store, temp_dir)
    }

    fn sample_set(session_id: &str) -> CommittedArtifactSet {
        let mut set = ArtifactSet::new();
        let mut index = ArtifactDraft::open("index.html", 0);
        index.push_line("<!DOCTYPE html><html></html>");
        set.push(index);
        let mut app = ArtifactDraft::open("src/app.js", 0);
        app.push_line("console.log('hi');");
        set.push(app);
        CommittedArtifactSet::from_artifacts(session_id, &set)
    }

    #[test]
    fn test_commit_record_shape() {
        let set = sample_set("s1");
        assert_eq!(set.len(), 2);
        assert_eq!(set.artifacts[1].kind, "js");
        assert_eq!(set.artifacts[1].content, "console.log('hi');");
        assert!(set.current().all(|a| !a.superseded));
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let (store, _tmp) = create_test_store();

        let project = store.create_project("Todo app", Some("demo")).await.unwrap();
        let fetched = store.get_project(&project.id).await.unwrap();
        assert_eq!(fetched.name, "Todo app");
        assert_eq!(fetched.status, ProjectStatus::Created);

        let listed = store.list_projects(10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_writes_files_and_status() {
        let (store, _tmp) = create_test_store();
        let project = store.create_project("p", None).await.unwrap();

        let written = store.commit(&project.id, &sample_set("s1")).await.unwrap();
        assert_eq!(written, 2);

        let project = store.get_project(&project.id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Generated);
        assert_eq!(project.last_session_id.as_deref(), Some("s1"));

        let files = store.list_files(&project.id).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "index.html");
        assert_eq!(files[1].file_type, "js");

        let contents = store.get_files(&project.id).await.unwrap();
        assert_eq!(contents[1].content, "console.log('hi');");
    }

    #[tokio::test]
    async fn test_recommit_replaces_previous_files() {
        let (store, _tmp) = create_test_store();
        let project = store.create_project("p", None).await.unwrap();

        store.commit(&project.id, &sample_set("s1")).await.unwrap();
        let mut second = ArtifactSet::new();
        second.push(ArtifactDraft::open("index.html", 0));
        store
            .commit(&project.id, &CommittedArtifactSet::from_artifacts("s2", &second))
            .await
            .unwrap();

        let files = store.list_files(&project.id).await.unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing_behind() {
        let (store, _tmp) = create_test_store();
        let project = store.create_project("p", None).await.unwrap();
        store.commit(&project.id, &sample_set("s1")).await.unwrap();

        // Duplicate (name, revision) violates the unique constraint mid-transaction
        let mut broken = sample_set("s2");
        broken.artifacts.push(broken.artifacts[0].clone());
        assert!(store.commit(&project.id, &broken).await.is_err());

        let project_after = store.get_project(&project.id).await.unwrap();
        assert_eq!(project_after.last_session_id.as_deref(), Some("s1"));
        let files = store.list_files(&project.id).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_unknown_project() {
        let (store, _tmp) = create_test_store();
        let result = store.commit("missing", &sample_set("s1")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let err = codeforge_core::Error::from(StoreError::NotFound("missing".to_string()));
        assert!(err.recovery_suggestion().is_some());
    }

    #[tokio::test]
    async fn test_record_failure() {
        let (store, _tmp) = create_test_store();
        let project = store.create_project("p", None).await.unwrap();

        store
            .record_failure(&project.id, "s9", "syntax-error in app.js")
            .await
            .unwrap();

        let project = store.get_project(&project.id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Failed);
        assert_eq!(project.failure_reason.as_deref(), Some("syntax-error in app.js"));
        assert!(store.list_files(&project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("codeforge.db");
        let id = {
            let store = SqliteArtifactStore::new(&path).unwrap();
            store.create_project("p", None).await.unwrap().id
        };
        let config = StorageConfig {
            database_path: Some(path.clone()),
        };
        let store = SqliteArtifactStore::from_config(&config).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(store.get_project(&id).await.is_ok());
    }
}
