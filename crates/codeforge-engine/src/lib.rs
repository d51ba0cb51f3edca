//! # codeforge-engine
//!
//! Streaming multi-file extraction and validation.
//!
//! Consumes the chunked token stream of a generative text service,
//! reconstructs the named artifacts it declares, guarantees an entry
//! artifact, validates the set, and commits it atomically while publishing
//! ordered progress events.
//!
//! ```text
//! chunk → LineReassembler → BoundaryMachine → ensure_entry → Validator → CommitCoordinator
//!                      \______________ ProgressEmitter ______________/
//! ```

pub mod boundary;
pub mod commit;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod prompt;
pub mod session;
pub mod validate;

pub use boundary::{BoundaryMachine, BoundaryState, LineClass, Transition};
pub use commit::CommitCoordinator;
pub use emitter::{NoOpSink, ProgressEmitter, ProgressSink};
pub use engine::{GenerationEngine, SessionOutcome, STARTING_MESSAGE};
pub use error::{EngineError, EngineResult};
pub use fallback::{ensure_entry, find_entry, FallbackOutcome};
pub use prompt::{GenerationContext, RequirementDocument};
pub use session::ExtractionSession;
pub use validate::{Repair, ValidationReport, Validator};
