//! Repeated shrinking of generated values terminates for every shipped
//! strategy, and every candidate is strictly smaller than its parent.

use std::fmt::Debug;

use lazycheck::gen::{FloatRole, GenContext};
use lazycheck::one_pass::{holds, BoundedSteps, IncreasingTimes, NonDecreasing};
use lazycheck::strategy::{self, Strategy};

const MAX_STEPS: usize = 10_000;
const RATE: FloatRole = FloatRole::new("rate", 12);

/// Follow the first candidate of each shrink stream until it runs dry,
/// checking `smaller` on every candidate offered along the way.
fn shrink_to_bottom<T, F>(strategy: &Strategy<T>, seeds: u64, size: usize, smaller: F)
where
    T: Clone + Debug + 'static,
    F: Fn(&T, &T) -> bool,
{
    for seed in 0..seeds {
        let mut current = strategy.generate(&mut GenContext::new(seed, size)).unwrap();
        let mut steps = 0;
        loop {
            let candidates = strategy.shrink(&current);
            for candidate in candidates.iter().take(50) {
                assert!(smaller(&candidate, &current), "{:?} is not smaller than {:?}", candidate, current);
            }
            match candidates.head() {
                Some(next) => current = next,
                None => break,
            }
            steps += 1;
            assert!(steps < MAX_STEPS, "seed {} did not bottom out", seed);
        }
    }
}

/// Follow the last candidate instead, which for most shrinkers is the
/// smallest possible change.
fn shrink_slowly<T, F>(strategy: &Strategy<T>, seed: u64, size: usize, smaller: F) -> usize
where
    T: Clone + Debug + 'static,
    F: Fn(&T, &T) -> bool,
{
    let mut current = strategy.generate(&mut GenContext::new(seed, size)).unwrap();
    let mut steps = 0;
    while let Some(next) = strategy.shrink(&current).iter().last() {
        assert!(smaller(&next, &current));
        current = next;
        steps += 1;
        assert!(steps < MAX_STEPS, "slow shrink did not bottom out");
    }
    steps
}

fn int_smaller(y: &i64, x: &i64) -> bool {
    y.unsigned_abs() < x.unsigned_abs() || *y == -*x
}

/// Shorter, or the same length with exactly one element replaced by a
/// smaller one.
fn list_smaller<T: PartialEq>(ys: &[T], xs: &[T], elem: impl Fn(&T, &T) -> bool) -> bool {
    if ys.len() < xs.len() {
        return true;
    }
    if ys.len() > xs.len() {
        return false;
    }
    let changed: Vec<usize> = (0..xs.len()).filter(|&i| ys[i] != xs[i]).collect();
    changed.len() == 1 && elem(&ys[changed[0]], &xs[changed[0]])
}

#[test]
fn test_scalars_bottom_out() {
    shrink_to_bottom(&strategy::ints(), 50, 1_000_000, int_smaller);
    shrink_to_bottom(&strategy::nats(), 50, 1_000_000, |y, x| y < x);
    shrink_to_bottom(&strategy::bools(), 10, 1, |y, x| !*y && *x);
    shrink_to_bottom(&strategy::int_range(-50, 900), 50, 0, int_smaller);
    shrink_to_bottom(&strategy::discrete_floats(RATE), 50, 10_000, |y, x| {
        int_smaller(&RATE.steps(*y), &RATE.steps(*x))
    });
    assert!(shrink_slowly(&strategy::ints(), 3, 200, int_smaller) <= 400);
}

#[test]
fn test_lists_and_arrays_bottom_out() {
    let lists = strategy::lists(strategy::ints());
    shrink_to_bottom(&lists, 30, 40, |ys, xs| list_smaller(ys, xs, int_smaller));
    let arrays = strategy::arrays(strategy::ints());
    shrink_to_bottom(&arrays, 30, 40, |ys, xs| list_smaller(ys, xs, int_smaller));
    let fixed = strategy::fixed_lists(6, strategy::ints());
    shrink_to_bottom(&fixed, 30, 40, |ys, xs| ys.len() == xs.len() && list_smaller(ys, xs, int_smaller));
    let fixed_arrays = strategy::fixed_arrays(6, strategy::nats());
    shrink_to_bottom(&fixed_arrays, 30, 40, |ys, xs| list_smaller(ys, xs, |y, x| y < x));
    shrink_slowly(&lists, 7, 25, |ys, xs| list_smaller(ys, xs, int_smaller));
}

#[test]
fn test_pairs_bottom_out() {
    let pairs = strategy::pairs(strategy::ints(), strategy::lists(strategy::bools()));
    shrink_to_bottom(&pairs, 30, 30, |(ya, yb), (xa, xb)| {
        (int_smaller(ya, xa) && yb == xb) || (ya == xa && list_smaller(yb, xb, |y, x| !*y && *x))
    });
}

#[test]
fn test_one_pass_lists_bottom_out_and_stay_valid() {
    let sorted = NonDecreasing { floor: 3 };
    shrink_to_bottom(&strategy::one_pass_lists(sorted), 30, 40, move |ys, xs| {
        holds(&sorted, ys) && ys.len() <= xs.len()
    });
    let walk = BoundedSteps { start: 0, max_step: 3 };
    shrink_to_bottom(&strategy::one_pass_lists(walk), 30, 40, move |ys, _| holds(&walk, ys));
    let times = IncreasingTimes { role: RATE, start_steps: -4 };
    shrink_to_bottom(&strategy::one_pass_lists(times), 30, 40, move |ys, _| holds(&times, ys));
}

#[test]
fn test_one_pass_slow_shrinks_terminate() {
    let sorted = strategy::one_pass_lists(NonDecreasing { floor: 0 });
    for seed in 0..5 {
        shrink_slowly(&sorted, seed, 30, |ys: &Vec<i64>, xs| {
            ys.len() < xs.len() || (ys.len() == xs.len() && ys < xs)
        });
    }
}
