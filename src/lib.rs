//! # lazycheck
//!
//! A property-based testing engine built on persistent lazy streams.
//!
//! Values come from [`Strategy`] pairs of a generator and a shrinker. The
//! [`Runner`] draws inputs at growing sizes, evaluates them through a
//! [`Sandbox`] so that a crashing property becomes an outcome rather than a
//! crash of the runner, and minimizes the first failure by greedy search over
//! lazily enumerated shrink candidates.

pub mod engine;
pub mod error;
pub mod gen;
pub mod minimize;
pub mod one_pass;
pub mod outcome;
pub mod properties;
pub mod property;
pub mod result_model;
pub mod sandbox;
pub mod shrink;
pub mod strategy;
pub mod stream;
pub mod worker;

// Re-export core types for easy access
pub use engine::{check, Counterexample, RunReport, Runner, RunnerConfig, RunnerStats};
pub use error::{GeneratorFailure, LengthMismatch, RunError, SandboxError, Side, UsageError, WorkerError};
pub use gen::{FloatRole, Gen, GenContext, GenResult};
pub use minimize::{CounterexampleRecord, Minimizer, ShrinkObserver};
pub use one_pass::OnePassInvariant;
pub use outcome::{Fault, FaultKind, TestOutcome};
pub use property::{Property, Verdict};
pub use result_model::{Comparator, ResultValue};
pub use sandbox::{InProcess, Sandbox, Subprocess};
pub use shrink::Shrinker;
pub use strategy::Strategy;
pub use stream::Stream;
pub use worker::{WorkerRegistry, WorkerReply, WorkerRequest};
