//! Built-in properties.
//!
//! These are what `lazycheck run` and `lazycheck worker` know by name. Each
//! pairs a strategy with the property it feeds; the worker only needs the
//! property half, since inputs arrive already generated.

use crate::gen::{FloatRole, QUANTUM};
use crate::one_pass::{BoundedSteps, IncreasingTimes, NonDecreasing};
use crate::property::Property;
use crate::result_model::{Comparator, ResultValue};
use crate::strategy::{self, Strategy};
use crate::worker::WorkerRegistry;

/// Role of sample times in [`increasing_times`].
pub const SAMPLE_TIME: FloatRole = FloatRole::new("sample_time", 1);

/// A strategy and the property it is meant to exercise.
pub struct Demo<T> {
    pub strategy: Strategy<T>,
    pub property: Property<T>,
}

/// Names and one-line descriptions, in listing order.
pub const CATALOG: &[(&str, &str)] = &[
    ("sum_reverse", "reversing a list of integers keeps its sum"),
    ("double_keeps_sorted", "doubling the first element above a threshold keeps a sorted list sorted (false)"),
    ("bounded_walk", "a walk with steps of at most 2 stays within 3 of the origin (false)"),
    ("increasing_times", "sample times are whole quanta apart"),
    ("panics_on_long_lists", "panics on lists longer than three elements (crashes)"),
];

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

pub fn sum_reverse() -> Demo<Vec<i64>> {
    Demo {
        strategy: strategy::lists(strategy::ints()),
        property: Property::predicate("sum_reverse", |xs: &Vec<i64>| {
            let forward: i64 = xs.iter().sum();
            let backward: i64 = xs.iter().rev().sum();
            forward == backward
        }),
    }
}

/// Doubles the first element at or above the threshold and checks the list
/// is still sorted. Fails whenever that element is positive and has a
/// successor less than twice its value.
pub fn double_keeps_sorted() -> Demo<(Vec<i64>, usize)> {
    Demo {
        strategy: strategy::pairs(strategy::one_pass_lists(NonDecreasing { floor: 0 }), strategy::nats()),
        property: Property::new("double_keeps_sorted", |(xs, threshold): &(Vec<i64>, usize)| {
            let threshold = i64::try_from(*threshold).unwrap_or(i64::MAX);
            let Some(index) = xs.iter().position(|&x| x >= threshold) else {
                return Ok(());
            };
            let mut doubled = xs.clone();
            doubled[index] = doubled[index].saturating_mul(2);
            if doubled.windows(2).all(|w| w[0] <= w[1]) {
                Ok(())
            } else {
                Err(format!("doubling index {} gives {:?}", index, doubled))
            }
        }),
    }
}

pub fn bounded_walk() -> Demo<Vec<i64>> {
    Demo {
        strategy: strategy::one_pass_lists(BoundedSteps { start: 0, max_step: 2 }),
        property: Property::new("bounded_walk", |walk: &Vec<i64>| match walk.iter().find(|x| x.abs() > 3) {
            Some(x) => Err(format!("walk reached {}", x)),
            None => Ok(()),
        }),
    }
}

pub fn increasing_times() -> Demo<Vec<f64>> {
    Demo {
        strategy: strategy::one_pass_lists(IncreasingTimes {
            role: SAMPLE_TIME,
            start_steps: 0,
        }),
        property: Property::expecting("increasing_times", Comparator::default(), |times: &Vec<f64>| {
            let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
            let whole = gaps.iter().map(|gap| (gap / QUANTUM).round().max(1.0) * QUANTUM);
            (ResultValue::floats(whole), ResultValue::floats(gaps.iter().copied()))
        }),
    }
}

pub fn panics_on_long_lists() -> Demo<Vec<i64>> {
    Demo {
        strategy: strategy::lists(strategy::ints()),
        property: Property::new("panics_on_long_lists", |xs: &Vec<i64>| {
            if xs.len() > 3 {
                panic!("list of length {} is too long", xs.len());
            }
            Ok(())
        }),
    }
}

/// A registry serving every built-in property.
pub fn worker_registry() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry
        .register(sum_reverse().property)
        .register(double_keeps_sorted().property)
        .register(bounded_walk().property)
        .register(increasing_times().property)
        .register(panics_on_long_lists().property);
    registry
}
