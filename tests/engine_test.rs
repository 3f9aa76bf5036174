use lazycheck::engine::{check, Runner, RunnerConfig, EXIT_FALSIFIED, EXIT_PASSED};
use lazycheck::gen::Gen;
use lazycheck::one_pass::{holds, NonDecreasing};
use lazycheck::properties;
use lazycheck::result_model::{Comparator, ResultValue};
use lazycheck::sandbox::{InProcess, Sandbox};
use lazycheck::shrink::{shrink_int, shrinker};
use lazycheck::strategy;
use lazycheck::{GeneratorFailure, Property, RunError, RunReport, Strategy, TestOutcome, UsageError};

fn seed_42(budget: usize) -> RunnerConfig {
    RunnerConfig::default().with_seed(42).with_max_tests(budget)
}

#[test]
fn test_sum_reverse_passes_its_budget() {
    let demo = properties::sum_reverse();
    let report = check(&demo.strategy, demo.property, seed_42(50)).unwrap();
    assert_eq!(report.to_string(), "50 tests passed");
    assert_eq!(report.exit_code(), EXIT_PASSED);
}

#[test]
fn test_double_keeps_sorted_shrinks_to_two_elements() {
    let demo = properties::double_keeps_sorted();
    let mut sandbox = InProcess::new(demo.property.clone());
    let mut runner = Runner::new(seed_42(50));
    let report = runner.run(&demo.strategy, &mut sandbox).unwrap();

    let counterexample = report.counterexample().expect("property should be falsified");
    assert_eq!(counterexample.seed, 42);
    assert_eq!(counterexample.value.0.len(), 2);
    assert!(holds(&NonDecreasing { floor: 0 }, &counterexample.value.0));
    assert!(counterexample.outcome.is_failure());
    assert!(counterexample.tests_run <= 50);
    assert_eq!(runner.stats.shrink_steps, counterexample.shrink_steps);
    assert_eq!(report.exit_code(), EXIT_FALSIFIED);

    let rendered = report.to_string();
    assert!(rendered.starts_with(&format!("Falsified after {} tests", counterexample.tests_run)));
    assert!(rendered.contains("with seed 42"));

    // local minimum: no shrink of the reported value still fails
    for child in demo.strategy.shrink(&counterexample.value).iter() {
        assert!(sandbox.evaluate(&child).is_pass(), "{:?} still fails", child);
    }
}

#[test]
fn test_same_seed_same_report() {
    let run = || {
        let demo = properties::bounded_walk();
        check(&demo.strategy, demo.property, seed_42(100)).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_crashing_property_is_minimized() {
    let demo = properties::panics_on_long_lists();
    let report = check(&demo.strategy, demo.property, seed_42(100)).unwrap();
    let counterexample = report.counterexample().expect("long lists should crash");
    assert_eq!(counterexample.value, vec![0, 0, 0, 0]);
    match &counterexample.outcome {
        TestOutcome::Crashed(fault) => assert!(fault.detail.contains("too long")),
        other => panic!("expected a crash, got {:?}", other),
    }
}

#[test]
fn test_max_shrinks_caps_accepted_steps() {
    let demo = properties::panics_on_long_lists();
    let config = seed_42(100).with_max_shrinks(Some(1));
    let report = check(&demo.strategy, demo.property, config).unwrap();
    let counterexample = report.counterexample().unwrap();
    if counterexample.original == vec![0, 0, 0, 0] {
        assert_eq!(counterexample.shrink_steps, 0);
    } else {
        assert_eq!(counterexample.shrink_steps, 1);
        assert_ne!(counterexample.value, counterexample.original);
    }
}

#[test]
fn test_always_true_properties_pass() {
    let demo = properties::increasing_times();
    let report = check(&demo.strategy, demo.property, seed_42(100)).unwrap();
    assert_eq!(report, RunReport::Passed { tests: 100 });
}

#[test]
fn test_generator_failure_aborts_with_seed() {
    let strategy: Strategy<usize> = Strategy::unshrinkable(Gen::new(|ctx| {
        if ctx.size() > 4 {
            Err(GeneratorFailure::Invalid("size too large".into()))
        } else {
            Ok(ctx.size())
        }
    }));
    let err = check(&strategy, Property::predicate("any", |_: &usize| true), seed_42(50)).unwrap_err();
    let RunError::Generator { attempt, seed, source } = err else {
        panic!("expected a generator failure, got {:?}", err);
    };
    assert_eq!((attempt, seed), (5, 42));
    assert_eq!(source, GeneratorFailure::Invalid("size too large".into()));
}

#[test]
fn test_wildcard_on_actual_side_aborts_the_run() {
    let property = Property::expecting("bad", Comparator::default(), |n: &i64| {
        (ResultValue::Int(*n), ResultValue::Wildcard)
    });
    let err = check(&strategy::ints(), property, seed_42(50)).unwrap_err();
    assert!(matches!(
        err,
        RunError::Usage { attempt: 0, seed: 42, source: UsageError::WildcardInActual }
    ));
    assert!(err.to_string().contains("wildcard is only allowed"), "{}", err);
}

#[test]
fn test_misuse_found_while_shrinking_aborts_the_run() {
    // the generated value fails honestly; small shrinks build an actual-side pattern
    let thousand = Strategy::new(Gen::from_fn(|_| 1000i64), shrinker(|n: &i64| shrink_int(*n)));
    let property = Property::expecting("misused_when_small", Comparator::default(), |n: &i64| {
        let actual = if *n < 3 { ResultValue::type_only(ResultValue::Int(0)) } else { ResultValue::Int(0) };
        (ResultValue::Int(if *n > 20 { 1 } else { 0 }), actual)
    });
    let mut sandbox = InProcess::new(property);
    let mut runner = Runner::new(seed_42(10));
    let err = runner.run(&thousand, &mut sandbox).unwrap_err();
    let RunError::Usage { attempt, source, .. } = err else {
        panic!("expected a usage error, got {:?}", err);
    };
    assert_eq!((attempt, source), (0, UsageError::TypeOnlyInActual));
    assert_eq!(runner.stats.shrink_steps, 0);
    assert_eq!(runner.stats.shrink_attempts, 1);
}

#[test]
fn test_reused_runner_reports_per_run_counts() {
    let demo = properties::sum_reverse();
    let mut sandbox = InProcess::new(demo.property.clone());
    let mut runner = Runner::new(seed_42(50));
    let first = runner.run(&demo.strategy, &mut sandbox).unwrap();
    let second = runner.run(&demo.strategy, &mut sandbox).unwrap();
    assert_eq!(first.to_string(), "50 tests passed");
    assert_eq!(second, first);
    assert_eq!(runner.stats.tests_run, 100);

    let failing = properties::double_keeps_sorted();
    let mut sandbox = InProcess::new(failing.property.clone());
    let mut runner = Runner::new(seed_42(50));
    let first = runner.run(&failing.strategy, &mut sandbox).unwrap();
    let second = runner.run(&failing.strategy, &mut sandbox).unwrap();
    assert_eq!(
        second.counterexample().map(|c| c.tests_run),
        first.counterexample().map(|c| c.tests_run)
    );
}
