//! Durable storage for Codeforge projects and generated files.
//!
//! A generation session writes exactly once: either the whole artifact set
//! through [`ArtifactStore::commit`] or a failure marker through
//! [`ArtifactStore::record_failure`].

pub mod store;

pub use store::{
    ArtifactStore, CommittedArtifact, CommittedArtifactSet, FileSummary, Project, Result,
    SqliteArtifactStore, StoreError, StoredFile,
};
