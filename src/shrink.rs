//! Shrinking primitives.
//!
//! A shrinker maps a value to a lazy stream of strictly smaller candidates.
//! Nothing here checks that contract at runtime; every shrinker in this module
//! keeps it so that repeated shrinking always terminates:
//!
//! * integers get smaller in magnitude, except that a negative `n` may first
//!   become `-n`;
//! * sequences get shorter, or keep their length and replace exactly one
//!   element by one of its own shrinks.
//!
//! Candidates come out in a fixed order, biggest simplifications first, so a
//! minimization run over the same input always tries the same candidates.

use std::rc::Rc;

use crate::gen::FloatRole;
use crate::stream::Stream;

/// A shared shrinking function.
pub type Shrinker<T> = Rc<dyn Fn(&T) -> Stream<T>>;

pub fn shrinker<T, F>(f: F) -> Shrinker<T>
where
    F: Fn(&T) -> Stream<T> + 'static,
{
    Rc::new(f)
}

/// The shrinker that never offers anything.
pub fn no_shrink<T: Clone + 'static>() -> Shrinker<T> {
    shrinker(|_| Stream::empty())
}

/// Shrink an integer: `-n` for negative `n`, then whichever of `0, 1, 2` are
/// smaller in magnitude, then `n - n/2, n - n/4, ...` (the value with more and
/// more of its low bits kept). Yields O(log |n|) candidates.
pub fn shrink_int(n: i64) -> Stream<i64> {
    if n == 0 {
        return Stream::empty();
    }
    let magnitude = n.unsigned_abs();
    let negated = if n < 0 && n != i64::MIN {
        Stream::singleton(-n)
    } else {
        Stream::empty()
    };
    let small = Stream::from_vec(vec![0i64, 1, 2]).filter(move |c| c.unsigned_abs() < magnitude);
    let halves = Stream::unfold(n / 2, |h: i64| if h == 0 { None } else { Some((h, h / 2)) })
        .map(move |h| n - h)
        .filter(move |c| c.unsigned_abs() < magnitude && !(0..=2).contains(c));
    negated.append(&small).append(&halves)
}

/// Shrink a natural number towards zero, same scheme as [`shrink_int`].
pub fn shrink_nat(n: usize) -> Stream<usize> {
    if n == 0 {
        return Stream::empty();
    }
    let small = Stream::from_vec(vec![0usize, 1, 2]).filter(move |&c| c < n);
    let halves = Stream::unfold(n / 2, |h: usize| if h == 0 { None } else { Some((h, h / 2)) })
        .map(move |h| n - h)
        .filter(|&c| c > 2);
    small.append(&halves)
}

pub fn shrink_bool(b: bool) -> Stream<bool> {
    if b {
        Stream::singleton(false)
    } else {
        Stream::empty()
    }
}

/// Shrink a discretized float by shrinking its quantum count; the role offset
/// is preserved so shrunk values keep their role.
pub fn shrink_discrete_float(role: FloatRole, x: f64) -> Stream<f64> {
    shrink_int(role.steps(x)).map(move |steps| role.value(steps))
}

/// Shrink either component, first before second.
pub fn shrink_pair<A, B>(pair: &(A, B), first: &Shrinker<A>, second: &Shrinker<B>) -> Stream<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (a, b) = pair.clone();
    let keep_b = b.clone();
    let keep_a = a.clone();
    let lefts = first(&a).map(move |a2| (a2, keep_b.clone()));
    let rights = second(&b).map(move |b2| (keep_a.clone(), b2));
    lefts.append(&rights)
}

fn positions(len: usize) -> Stream<usize> {
    Stream::unfold(0usize, move |i| if i < len { Some((i, i + 1)) } else { None })
}

fn remove_at<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len().saturating_sub(1));
    out.extend_from_slice(&items[..index]);
    out.extend_from_slice(&items[index + 1..]);
    out
}

fn replace_at<T: Clone>(items: &[T], index: usize, value: T) -> Vec<T> {
    let mut out = items.to_vec();
    out[index] = value;
    out
}

fn element_shrinks_at<T: Clone + 'static>(items: &Rc<Vec<T>>, index: usize, elem: &Shrinker<T>) -> Stream<Vec<T>> {
    let items = Rc::clone(items);
    elem(&items[index]).map(move |value| replace_at(&items, index, value))
}

fn drop_at<T: Clone + 'static>(items: &Rc<Vec<T>>, index: usize) -> Stream<Vec<T>> {
    let items = Rc::clone(items);
    Stream::delay(move || Stream::singleton(remove_at(&items, index)))
}

/// Head-first list shrinking: for each position, drop that element, then try
/// each shrink of it, keeping everything before it.
pub fn shrink_list<T: Clone + 'static>(items: &[T], elem: &Shrinker<T>) -> Stream<Vec<T>> {
    let items = Rc::new(items.to_vec());
    let elem = Rc::clone(elem);
    positions(items.len()).flat_map(move |i| drop_at(&items, i).append(&element_shrinks_at(&items, i, &elem)))
}

/// Length-preserving list shrinking: for each position, each shrink of that
/// element.
pub fn shrink_fixed_size_list<T: Clone + 'static>(items: &[T], elem: &Shrinker<T>) -> Stream<Vec<T>> {
    let items = Rc::new(items.to_vec());
    let elem = Rc::clone(elem);
    positions(items.len()).flat_map(move |i| element_shrinks_at(&items, i, &elem))
}

/// Random-access shrinking: every single-element removal first, then every
/// single-element shrink.
pub fn shrink_array<T: Clone + 'static>(items: &[T], elem: &Shrinker<T>) -> Stream<Vec<T>> {
    let items = Rc::new(items.to_vec());
    let removals = {
        let items = Rc::clone(&items);
        positions(items.len()).flat_map(move |i| drop_at(&items, i))
    };
    removals.append(&shrink_fixed_size_array(&items, elem))
}

/// Random-access shrinking without changing the length.
pub fn shrink_fixed_size_array<T: Clone + 'static>(items: &[T], elem: &Shrinker<T>) -> Stream<Vec<T>> {
    shrink_fixed_size_list(items, elem)
}
