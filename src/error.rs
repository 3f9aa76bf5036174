//! Error taxonomy for the engine.
//!
//! Only contract violations and fatal configuration errors live here. A
//! property that fails or crashes is not an error: the sandbox turns it into a
//! [`TestOutcome`](crate::outcome::TestOutcome) value so the driver loop never
//! has to unwind through a single candidate.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Which side of a paired stream operation had surplus elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Raised by `zip_with_strict` when the two streams differ in length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream lengths differ: the {side} stream is longer")]
pub struct LengthMismatch {
    pub side: Side,
}

/// A generator could not produce a value. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorFailure {
    #[error("generator rejected {rejected} consecutive draws")]
    Exhausted { rejected: usize },

    #[error("generator panicked: {0}")]
    Panicked(String),

    #[error("invalid generator: {0}")]
    Invalid(String),
}

/// Misuse of the result model. Aborts the run instead of being shrunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum UsageError {
    #[error("wildcard is only allowed on the expected side of a comparison")]
    WildcardInActual,

    #[error("type-only pattern is only allowed on the expected side of a comparison")]
    TypeOnlyInActual,
}

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("generator failed on attempt {attempt} (seed {seed}): {source}")]
    Generator {
        attempt: usize,
        seed: u64,
        #[source]
        source: GeneratorFailure,
    },

    #[error("property misused on attempt {attempt} (seed {seed}): {source}")]
    Usage {
        attempt: usize,
        seed: u64,
        #[source]
        source: UsageError,
    },
}

/// Failures of the subprocess sandbox machinery itself.
///
/// These never escape `Sandbox::evaluate`; they are reported as a crashed
/// outcome with a protocol fault.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("worker IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode worker request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed worker reply: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors raised while a worker serves a request.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker IO error: {0}")]
    Io(#[from] io::Error),
}
