//! Greedy counterexample minimization.
//!
//! Each round pulls the shrink stream of the current value lazily and tests
//! candidates in stream order; the first one that still fails becomes the new
//! current value. The search stops at a local minimum, a value none of whose
//! shrinks fail. Cost is bounded by accepted steps times the depth searched
//! per round, never by the size of the full shrink space. A candidate that
//! misuses the result model stops the search with a [`UsageError`].

use std::fmt::Debug;

use serde::Serialize;

use crate::error::UsageError;
use crate::outcome::TestOutcome;
use crate::sandbox::Sandbox;
use crate::shrink::Shrinker;

/// The current best counterexample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterexampleRecord<T> {
    pub value: T,
    pub outcome: TestOutcome,
    /// Number of accepted shrinks so far.
    pub steps: usize,
}

/// Receives every candidate the minimizer tests.
pub trait ShrinkObserver<T> {
    fn candidate(&mut self, _value: &T, _outcome: &TestOutcome) {}

    fn accepted(&mut self, _record: &CounterexampleRecord<T>) {}
}

/// Observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl<T> ShrinkObserver<T> for NoTrace {}

/// Logs every tested candidate and its verdict at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl<T: Debug> ShrinkObserver<T> for LogTrace {
    fn candidate(&mut self, value: &T, outcome: &TestOutcome) {
        let verdict = if outcome.is_pass() { "pass" } else { "FAIL" };
        log::info!("SHRINK: [{}] {:?} -> {}", verdict, value, outcome);
    }

    fn accepted(&mut self, record: &CounterexampleRecord<T>) {
        log::info!("SHRINK: step {} accepted {:?}", record.steps, record.value);
    }
}

pub struct Minimizer<'a, T, S: ?Sized> {
    sandbox: &'a mut S,
    shrinker: Shrinker<T>,
    max_steps: Option<usize>,
    attempts: usize,
}

impl<'a, T, S> Minimizer<'a, T, S>
where
    T: Clone + 'static,
    S: Sandbox<T> + ?Sized,
{
    pub fn new(sandbox: &'a mut S, shrinker: Shrinker<T>) -> Self {
        Minimizer {
            sandbox,
            shrinker,
            max_steps: None,
            attempts: 0,
        }
    }

    /// Stop after `max_steps` accepted shrinks even if more are available.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Candidates evaluated so far, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn minimize(
        &mut self,
        value: T,
        outcome: TestOutcome,
        observer: &mut dyn ShrinkObserver<T>,
    ) -> Result<CounterexampleRecord<T>, UsageError> {
        if let Some(err) = outcome.usage_error() {
            return Err(err);
        }
        let mut record = CounterexampleRecord {
            value,
            outcome,
            steps: 0,
        };
        if record.outcome.is_pass() {
            log::warn!("SHRINK: asked to minimize a passing value; returning it unchanged");
            return Ok(record);
        }

        while self.max_steps.map_or(true, |max| record.steps < max) {
            let candidates = (self.shrinker)(&record.value);
            let sandbox = &mut *self.sandbox;
            let attempts = &mut self.attempts;
            let next = candidates.find_map(|candidate| {
                *attempts += 1;
                let outcome = sandbox.evaluate(&candidate);
                observer.candidate(&candidate, &outcome);
                if let Some(err) = outcome.usage_error() {
                    Some(Err(err))
                } else if outcome.is_failure() {
                    Some(Ok((candidate, outcome)))
                } else {
                    None
                }
            });
            match next.transpose()? {
                Some((value, outcome)) => {
                    record.value = value;
                    record.outcome = outcome;
                    record.steps += 1;
                    observer.accepted(&record);
                }
                None => break,
            }
        }

        log::debug!(
            "SHRINK: finished after {} steps and {} attempts",
            record.steps,
            self.attempts
        );
        Ok(record)
    }
}

/// Minimize `value` through `sandbox` without tracing or a step cap.
pub fn minimize<T, S>(
    sandbox: &mut S,
    shrinker: &Shrinker<T>,
    value: T,
    outcome: TestOutcome,
) -> Result<CounterexampleRecord<T>, UsageError>
where
    T: Clone + 'static,
    S: Sandbox<T> + ?Sized,
{
    Minimizer::new(sandbox, shrinker.clone()).minimize(value, outcome, &mut NoTrace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use crate::sandbox::InProcess;
    use crate::shrink::{shrink_int, shrink_list, shrinker};

    fn below(limit: i64) -> InProcess<i64> {
        InProcess::new(Property::predicate("below", move |n: &i64| *n < limit))
    }

    #[derive(Default)]
    struct Recorder {
        tested: Vec<i64>,
        accepted: Vec<i64>,
    }

    impl ShrinkObserver<i64> for Recorder {
        fn candidate(&mut self, value: &i64, _outcome: &TestOutcome) {
            self.tested.push(*value);
        }

        fn accepted(&mut self, record: &CounterexampleRecord<i64>) {
            self.accepted.push(record.value);
        }
    }

    #[test]
    fn test_minimizes_to_boundary() {
        let mut sandbox = below(10);
        let ints = shrinker(|n: &i64| shrink_int(*n));
        let record = minimize(&mut sandbox, &ints, 1000, TestOutcome::Counterexample("big".into())).unwrap();
        assert_eq!(record.value, 10);
        assert!(record.steps > 0);
        for child in shrink_int(record.value).iter() {
            assert!(sandbox.evaluate(&child).is_pass());
        }
    }

    #[test]
    fn test_observer_sees_candidates_in_stream_order() {
        let mut sandbox = below(3);
        let mut recorder = Recorder::default();
        let mut minimizer = Minimizer::new(&mut sandbox, shrinker(|n: &i64| shrink_int(*n)));
        let record = minimizer.minimize(5, TestOutcome::Counterexample("5".into()), &mut recorder).unwrap();
        // shrink_int(5) = 0, 1, 2, 3, 4: 3 is the first failure; shrink_int(3) = 0, 1, 2
        assert_eq!(recorder.tested, vec![0, 1, 2, 3, 0, 1, 2]);
        assert_eq!(recorder.accepted, vec![3]);
        assert_eq!(record.value, 3);
        assert_eq!(minimizer.attempts(), 7);
    }

    #[test]
    fn test_step_cap() {
        let mut sandbox = InProcess::new(Property::predicate("zero", |n: &i64| *n == 0));
        let mut minimizer =
            Minimizer::new(&mut sandbox, shrinker(|n: &i64| shrink_int(*n))).with_max_steps(Some(1));
        let record = minimizer.minimize(-100, TestOutcome::Counterexample("neg".into()), &mut NoTrace).unwrap();
        assert_eq!(record.steps, 1);
        assert_eq!(record.value, 100);
    }

    #[test]
    fn test_passing_value_is_returned_unchanged() {
        let mut sandbox = below(100);
        let ints = shrinker(|n: &i64| shrink_int(*n));
        let record = minimize(&mut sandbox, &ints, 7, TestOutcome::Pass).unwrap();
        assert_eq!(record, CounterexampleRecord { value: 7, outcome: TestOutcome::Pass, steps: 0 });
    }

    #[test]
    fn test_crashes_are_minimized_like_failures() {
        let mut sandbox = InProcess::new(Property::new("no_long_lists", |xs: &Vec<i64>| {
            assert!(xs.len() < 2, "too long");
            Ok(())
        }));
        let elem = shrinker(|n: &i64| shrink_int(*n));
        let lists = shrinker(move |xs: &Vec<i64>| shrink_list(xs, &elem));
        let start = vec![5, -7, 9, 11];
        let initial = sandbox.evaluate(&start);
        let record = minimize(&mut sandbox, &lists, start, initial).unwrap();
        assert_eq!(record.value, vec![0, 0]);
        assert!(matches!(record.outcome, TestOutcome::Crashed(_)));
    }

    #[test]
    fn test_misuse_stops_the_search() {
        // odd values fail; values below 4 misuse the comparator
        let mut sandbox = InProcess::new(Property::new("odd_or_misused", |n: &i64| {
            if *n < 4 {
                std::panic::panic_any(UsageError::WildcardInActual);
            }
            if n % 2 == 0 {
                Ok(())
            } else {
                Err("odd".to_string())
            }
        }));
        let mut recorder = Recorder::default();
        let mut minimizer = Minimizer::new(&mut sandbox, shrinker(|n: &i64| shrink_int(*n)));
        let err = minimizer
            .minimize(9, TestOutcome::Counterexample("odd".into()), &mut recorder)
            .unwrap_err();
        assert_eq!(err, UsageError::WildcardInActual);
        // shrink_int(9) starts at 0, which misuses before anything is accepted
        assert_eq!(recorder.tested, vec![0]);
        assert!(recorder.accepted.is_empty());

        let initial = TestOutcome::Misused(UsageError::TypeOnlyInActual);
        let ints = shrinker(|n: &i64| shrink_int(*n));
        assert_eq!(minimize(&mut sandbox, &ints, 9, initial), Err(UsageError::TypeOnlyInActual));
    }
}
