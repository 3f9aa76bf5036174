//! The result of evaluating a property on one candidate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "snake_case")]
pub enum FaultKind {
    /// The property panicked.
    Panic,
    /// The worker process was killed by a signal.
    Signal(i32),
    /// The worker process exited with a nonzero status before replying.
    Exit(i32),
    /// The worker replied with something that is not a reply.
    Protocol,
}

/// What went wrong when a property crashed instead of returning a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub detail: String,
}

impl Fault {
    pub fn panic(detail: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::Panic,
            detail: detail.into(),
        }
    }

    pub fn signal(signal: i32, detail: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::Signal(signal),
            detail: detail.into(),
        }
    }

    pub fn exit(code: i32, detail: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::Exit(code),
            detail: detail.into(),
        }
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::Protocol,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Panic => return write!(f, "panicked: {}", self.detail),
            FaultKind::Protocol => return write!(f, "worker protocol error: {}", self.detail),
            FaultKind::Signal(sig) => write!(f, "killed by signal {}", sig)?,
            FaultKind::Exit(code) => write!(f, "exited with status {}", code)?,
        }
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

/// Outcome of one property evaluation.
///
/// `Counterexample`, `Crashed` and `TimedOut` are failures and drive
/// shrinking. `Misused` is neither a pass nor a failure: the property broke
/// the result model's contract and the run is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Counterexample(String),
    Crashed(Fault),
    TimedOut(Duration),
    Misused(UsageError),
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TestOutcome::Counterexample(_) | TestOutcome::Crashed(_) | TestOutcome::TimedOut(_)
        )
    }

    pub fn usage_error(&self) -> Option<UsageError> {
        match self {
            TestOutcome::Misused(err) => Some(*err),
            _ => None,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Pass => write!(f, "passed"),
            TestOutcome::Counterexample(reason) => write!(f, "falsified: {}", reason),
            TestOutcome::Crashed(fault) => write!(f, "crashed: {}", fault),
            TestOutcome::TimedOut(limit) => write!(f, "timed out after {} ms", limit.as_millis()),
            TestOutcome::Misused(err) => write!(f, "misused: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pass_is_not_a_failure() {
        assert!(TestOutcome::Pass.is_pass());
        assert!(TestOutcome::Counterexample("x".into()).is_failure());
        assert!(TestOutcome::Crashed(Fault::panic("boom")).is_failure());
        assert!(TestOutcome::TimedOut(Duration::from_millis(5)).is_failure());
        let misused = TestOutcome::Misused(UsageError::WildcardInActual);
        assert!(!misused.is_pass() && !misused.is_failure());
        assert_eq!(misused.usage_error(), Some(UsageError::WildcardInActual));
    }

    #[test]
    fn test_display() {
        assert_eq!(TestOutcome::Crashed(Fault::panic("boom")).to_string(), "crashed: panicked: boom");
        assert_eq!(TestOutcome::Crashed(Fault::signal(11, "")).to_string(), "crashed: killed by signal 11");
        assert_eq!(
            TestOutcome::Crashed(Fault::exit(3, "no reply")).to_string(),
            "crashed: exited with status 3 (no reply)"
        );
        assert_eq!(TestOutcome::TimedOut(Duration::from_millis(250)).to_string(), "timed out after 250 ms");
    }

    #[test]
    fn test_serde_round_trip_of_crash() {
        let outcome = TestOutcome::Crashed(Fault::signal(9, "killed"));
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(serde_json::from_str::<TestOutcome>(&json).unwrap(), outcome);
    }

    #[test]
    fn test_misuse_crosses_the_wire() {
        let json = r#"{"outcome":"misused","detail":"TypeOnlyInActual"}"#;
        assert_eq!(
            serde_json::from_str::<TestOutcome>(json).unwrap(),
            TestOutcome::Misused(UsageError::TypeOnlyInActual)
        );
    }
}
