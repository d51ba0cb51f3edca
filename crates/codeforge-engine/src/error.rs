//! Engine setup errors.
//!
//! Failures inside a running session are not errors of this type: they end
//! the session with a [`codeforge_core::SessionFailure`] and a terminal
//! event. `EngineError` covers what prevents a session from starting.

use codeforge_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A grammar could not be loaded into the syntax checker.
    #[error("Syntax checker error: {0}")]
    Grammar(String),

    /// A reference pattern failed to compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// The owning project could not be loaded.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
