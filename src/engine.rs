//! The test runner.
//!
//! [`Runner`] drives the generate/test/shrink loop: for attempt `i` it draws
//! a value at size `i` from a seed derived from the run seed, evaluates it
//! through a [`Sandbox`], and on the first failure hands the value to the
//! [`Minimizer`]. A run either passes its whole budget, is falsified with a
//! minimized counterexample, or is aborted because the generator failed or
//! the property misused the result model.

use std::fmt;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{GeneratorFailure, RunError, UsageError};
use crate::gen::GenContext;
use crate::minimize::{CounterexampleRecord, LogTrace, Minimizer, NoTrace};
use crate::outcome::TestOutcome;
use crate::property::Property;
use crate::sandbox::{panic_message, InProcess, Sandbox};
use crate::strategy::Strategy;

/// Every test in the budget passed.
pub const EXIT_PASSED: i32 = 0;
/// A counterexample was found.
pub const EXIT_FALSIFIED: i32 = 1;
/// The run was aborted before reaching a verdict.
pub const EXIT_ABORTED: i32 = 2;

/// Configuration for the Runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Number of inputs to try before declaring success
    pub max_tests: usize,

    /// Random seed for deterministic execution
    pub seed: u64,

    /// Minimize counterexamples
    pub shrink: bool,

    /// Maximum number of accepted shrinks
    pub max_shrinks: Option<usize>,

    /// Upper bound for the size policy
    pub max_size: Option<usize>,

    /// Log every shrink candidate and its verdict
    pub trace_shrinks: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_tests: 100,
            seed: 0,
            shrink: true,
            max_shrinks: None,
            max_size: None,
            trace_shrinks: false,
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `LAZYCHECK_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values.
    /// Values that do not parse are ignored.
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(seed) = parse_var(&lookup, "LAZYCHECK_SEED") {
            self.seed = seed;
        }
        if let Some(tests) = parse_var(&lookup, "LAZYCHECK_TESTS") {
            self.max_tests = tests;
        }
        if let Some(raw) = lookup("LAZYCHECK_NO_SHRINK") {
            self.shrink = !truthy(&raw);
        }
        if let Some(max) = parse_var(&lookup, "LAZYCHECK_MAX_SHRINKS") {
            self.max_shrinks = Some(max);
        }
        if let Some(raw) = lookup("LAZYCHECK_TRACE") {
            self.trace_shrinks = truthy(&raw);
        }
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_tests(mut self, max_tests: usize) -> Self {
        self.max_tests = max_tests;
        self
    }

    pub fn with_shrink(mut self, shrink: bool) -> Self {
        self.shrink = shrink;
        self
    }

    pub fn with_max_shrinks(mut self, max_shrinks: Option<usize>) -> Self {
        self.max_shrinks = max_shrinks;
        self
    }

    pub fn with_max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_trace_shrinks(mut self, trace: bool) -> Self {
        self.trace_shrinks = trace;
        self
    }

    /// Size used for attempt `attempt`: the attempt index, capped by
    /// `max_size`.
    pub fn size_for(&self, attempt: usize) -> usize {
        match self.max_size {
            Some(max) => attempt.min(max),
            None => attempt,
        }
    }

    /// RNG seed of attempt `attempt`. Any single attempt can be regenerated
    /// from the run seed and its index.
    pub fn attempt_seed(&self, attempt: usize) -> u64 {
        self.seed.wrapping_add(attempt as u64)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("RUNNER: ignoring {}={:?}: {}", key, raw, err);
            None
        }
    }
}

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Statistics about test execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Inputs evaluated during generation, including the failing one
    pub tests_run: usize,

    /// Shrink candidates evaluated
    pub shrink_attempts: usize,

    /// Shrink candidates accepted
    pub shrink_steps: usize,

    pub generation_time: Duration,
    pub testing_time: Duration,
    pub shrinking_time: Duration,
}

/// A falsified run, with everything needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counterexample<T> {
    /// Run seed.
    pub seed: u64,
    /// Index of the failing attempt.
    pub attempt: usize,
    /// Size the failing value was generated at.
    pub size: usize,
    pub tests_run: usize,
    pub shrink_steps: usize,
    /// The value as first generated.
    pub original: T,
    /// The minimized value.
    pub value: T,
    pub outcome: TestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunReport<T> {
    Passed { tests: usize },
    Falsified(Counterexample<T>),
}

impl<T> RunReport<T> {
    pub fn is_passed(&self) -> bool {
        matches!(self, RunReport::Passed { .. })
    }

    pub fn counterexample(&self) -> Option<&Counterexample<T>> {
        match self {
            RunReport::Passed { .. } => None,
            RunReport::Falsified(counterexample) => Some(counterexample),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunReport::Passed { .. } => EXIT_PASSED,
            RunReport::Falsified(_) => EXIT_FALSIFIED,
        }
    }
}

impl<T: Serialize> RunReport<T> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl<T: Debug> fmt::Display for RunReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReport::Passed { tests } => write!(f, "{} tests passed", tests),
            RunReport::Falsified(c) => write!(
                f,
                "Falsified after {} tests ({} shrinks) with seed {}:\n{:?}\n{}",
                c.tests_run, c.shrink_steps, c.seed, c.value, c.outcome
            ),
        }
    }
}

/// Main test execution engine
#[derive(Debug, Default)]
pub struct Runner {
    pub config: RunnerConfig,
    pub stats: RunnerStats,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            stats: RunnerStats::default(),
        }
    }

    /// Run the generate/test/shrink loop.
    ///
    /// A failing or crashing property is a report, not an error. A run is
    /// aborted when the generator fails to produce a value or the property
    /// misuses the result model. `stats` accumulate across runs; the counts
    /// in the report are for this run only.
    pub fn run<T, S>(&mut self, strategy: &Strategy<T>, sandbox: &mut S) -> Result<RunReport<T>, RunError>
    where
        T: Clone + Debug + 'static,
        S: Sandbox<T> + ?Sized,
    {
        log::debug!("RUNNER: starting run with {:?}", self.config);
        let mut tests_run = 0;

        for attempt in 0..self.config.max_tests {
            let seed = self.config.attempt_seed(attempt);
            let size = self.config.size_for(attempt);

            let started = Instant::now();
            let value = self.draw(strategy, attempt, size)?;
            self.stats.generation_time += started.elapsed();

            let started = Instant::now();
            let outcome = sandbox.evaluate(&value);
            self.stats.testing_time += started.elapsed();
            self.stats.tests_run += 1;
            tests_run += 1;

            if outcome.is_pass() {
                log::debug!("RUNNER: attempt {} (seed {}, size {}) passed", attempt, seed, size);
                continue;
            }
            if let Some(source) = outcome.usage_error() {
                return Err(self.misused(attempt, source));
            }

            log::info!("RUNNER: attempt {} (seed {}, size {}) {}", attempt, seed, size, outcome);
            let original = value.clone();
            let record = self
                .shrinking_phase(strategy, sandbox, value, outcome)
                .map_err(|source| self.misused(attempt, source))?;
            let counterexample = Counterexample {
                seed: self.config.seed,
                attempt,
                size,
                tests_run,
                shrink_steps: record.steps,
                original,
                value: record.value,
                outcome: record.outcome,
            };
            log::info!(
                "RUNNER: falsified after {} tests, {} shrinks",
                counterexample.tests_run,
                counterexample.shrink_steps
            );
            return Ok(RunReport::Falsified(counterexample));
        }

        log::info!("RUNNER: {} tests passed", tests_run);
        Ok(RunReport::Passed { tests: tests_run })
    }

    fn misused(&self, attempt: usize, source: UsageError) -> RunError {
        log::error!("RUNNER: property misused the result model on attempt {}: {}", attempt, source);
        RunError::Usage {
            attempt,
            seed: self.config.seed,
            source,
        }
    }

    fn draw<T: Clone + 'static>(&self, strategy: &Strategy<T>, attempt: usize, size: usize) -> Result<T, RunError> {
        let mut ctx = GenContext::new(self.config.attempt_seed(attempt), size);
        let drawn = catch_unwind(AssertUnwindSafe(|| strategy.generate(&mut ctx)))
            .unwrap_or_else(|payload| Err(GeneratorFailure::Panicked(panic_message(payload.as_ref()))));
        drawn.map_err(|source| {
            log::error!("RUNNER: generator failed on attempt {}: {}", attempt, source);
            RunError::Generator {
                attempt,
                seed: self.config.seed,
                source,
            }
        })
    }

    fn shrinking_phase<T, S>(
        &mut self,
        strategy: &Strategy<T>,
        sandbox: &mut S,
        value: T,
        outcome: TestOutcome,
    ) -> Result<CounterexampleRecord<T>, UsageError>
    where
        T: Clone + Debug + 'static,
        S: Sandbox<T> + ?Sized,
    {
        if !self.config.shrink {
            return Ok(CounterexampleRecord {
                value,
                outcome,
                steps: 0,
            });
        }

        let started = Instant::now();
        let mut minimizer =
            Minimizer::new(sandbox, strategy.shrinker().clone()).with_max_steps(self.config.max_shrinks);
        let record = if self.config.trace_shrinks {
            minimizer.minimize(value, outcome, &mut LogTrace)
        } else {
            minimizer.minimize(value, outcome, &mut NoTrace)
        };
        self.stats.shrink_attempts += minimizer.attempts();
        self.stats.shrinking_time += started.elapsed();
        let record = record?;
        self.stats.shrink_steps += record.steps;
        Ok(record)
    }
}

/// Run `property` in-process over values from `strategy`.
pub fn check<T>(strategy: &Strategy<T>, property: Property<T>, config: RunnerConfig) -> Result<RunReport<T>, RunError>
where
    T: Clone + Debug + 'static,
{
    let mut sandbox = InProcess::new(property);
    Runner::new(config).run(strategy, &mut sandbox)
}
