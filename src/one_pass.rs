//! Invariant-preserving sequences.
//!
//! Some inputs are only meaningful when a left-to-right scan with an
//! accumulator accepts them: sorted lists, strictly increasing sample times,
//! walks with a bounded step. Generating those with a filter wastes almost
//! every draw, and shrinking them element by element produces mostly invalid
//! candidates. A [`OnePassInvariant`] describes the scan once; generation,
//! repair and shrinking all thread the same accumulator.
//!
//! Shrinking offers, position by position, either dropping the element or
//! replacing it with one of its (accumulator-aware) shrinks, and then runs a
//! fixup pass over the suffix. The fixup repairs the invariant locally with the
//! smallest change it knows; it does not search for the globally smallest valid
//! suffix.

use std::rc::Rc;

use crate::gen::{FloatRole, Gen, GenContext, GenResult};
use crate::shrink::{shrink_int, shrink_nat};
use crate::stream::Stream;

/// A sequence property checkable by one left-to-right scan.
///
/// `fixup` must be pure, idempotent, and return `item` unchanged when
/// `accepts(acc, item)` already holds. `shrink(acc, item)` must only yield
/// items that `acc` accepts and that are strictly smaller than `item`.
pub trait OnePassInvariant: 'static {
    type Item: Clone + 'static;
    type Acc: Clone + 'static;

    fn initial(&self) -> Self::Acc;

    fn step(&self, acc: &Self::Acc, item: &Self::Item) -> Self::Acc;

    fn accepts(&self, acc: &Self::Acc, item: &Self::Item) -> bool;

    fn fixup(&self, acc: &Self::Acc, item: &Self::Item) -> Self::Item;

    fn generate(&self, ctx: &mut GenContext, acc: &Self::Acc) -> GenResult<Self::Item>;

    fn shrink(&self, acc: &Self::Acc, item: &Self::Item) -> Stream<Self::Item>;
}

/// Whether the whole sequence satisfies the invariant.
pub fn holds<I: OnePassInvariant>(invariant: &I, items: &[I::Item]) -> bool {
    let mut acc = invariant.initial();
    for item in items {
        if !invariant.accepts(&acc, item) {
            return false;
        }
        acc = invariant.step(&acc, item);
    }
    true
}

/// Repair `suffix` so that it is valid when the scan reaches it with `acc`.
pub fn fixup_suffix<I: OnePassInvariant>(invariant: &I, acc: &I::Acc, suffix: &[I::Item]) -> Vec<I::Item> {
    let mut acc = acc.clone();
    let mut out = Vec::with_capacity(suffix.len());
    for item in suffix {
        let fixed = invariant.fixup(&acc, item);
        acc = invariant.step(&acc, &fixed);
        out.push(fixed);
    }
    out
}

/// Lists of length `0..=size` built by threading the accumulator through
/// the per-element generator.
pub fn gen_1pass_list<I: OnePassInvariant>(invariant: Rc<I>) -> Gen<Vec<I::Item>> {
    Gen::new(move |ctx| {
        let len = ctx.nat();
        let mut acc = invariant.initial();
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let item = invariant.generate(ctx, &acc)?;
            acc = invariant.step(&acc, &item);
            out.push(item);
        }
        Ok(out)
    })
}

/// Shrink a valid list, keeping it valid.
pub fn shrink_1pass_list<I: OnePassInvariant>(invariant: &Rc<I>, items: &[I::Item]) -> Stream<Vec<I::Item>> {
    let items: Rc<Vec<I::Item>> = Rc::new(items.to_vec());
    let mut accs = Vec::with_capacity(items.len() + 1);
    let mut acc = invariant.initial();
    for item in items.iter() {
        accs.push(acc.clone());
        acc = invariant.step(&acc, item);
    }
    let accs = Rc::new(accs);
    let invariant = Rc::clone(invariant);
    let positions = Stream::unfold(0usize, {
        let len = items.len();
        move |i| if i < len { Some((i, i + 1)) } else { None }
    });
    positions.flat_map(move |i| candidates_at(&invariant, &items, &accs, i))
}

fn candidates_at<I: OnePassInvariant>(
    invariant: &Rc<I>,
    items: &Rc<Vec<I::Item>>,
    accs: &Rc<Vec<I::Acc>>,
    index: usize,
) -> Stream<Vec<I::Item>> {
    let dropped = {
        let (invariant, items, accs) = (Rc::clone(invariant), Rc::clone(items), Rc::clone(accs));
        Stream::delay(move || {
            let mut out = items[..index].to_vec();
            out.extend(fixup_suffix(invariant.as_ref(), &accs[index], &items[index + 1..]));
            Stream::singleton(out)
        })
    };
    let replaced = {
        let (invariant, items, accs) = (Rc::clone(invariant), Rc::clone(items), Rc::clone(accs));
        let acc = accs[index].clone();
        invariant.shrink(&acc, &items[index]).map(move |value| {
            let next = invariant.step(&acc, &value);
            let mut out = items[..index].to_vec();
            out.push(value);
            out.extend(fixup_suffix(invariant.as_ref(), &next, &items[index + 1..]));
            out
        })
    };
    dropped.append(&replaced)
}

/// Non-decreasing integers, none below `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonDecreasing {
    pub floor: i64,
}

impl OnePassInvariant for NonDecreasing {
    type Item = i64;
    type Acc = i64;

    fn initial(&self) -> i64 {
        self.floor
    }

    fn step(&self, _acc: &i64, item: &i64) -> i64 {
        *item
    }

    fn accepts(&self, acc: &i64, item: &i64) -> bool {
        item >= acc
    }

    fn fixup(&self, acc: &i64, item: &i64) -> i64 {
        (*item).max(*acc)
    }

    fn generate(&self, ctx: &mut GenContext, acc: &i64) -> GenResult<i64> {
        let gap = i64::try_from(ctx.nat()).unwrap_or(i64::MAX);
        Ok(acc.saturating_add(gap))
    }

    fn shrink(&self, acc: &i64, item: &i64) -> Stream<i64> {
        let base = *acc;
        let gap = usize::try_from(item.saturating_sub(base)).unwrap_or(0);
        shrink_nat(gap).map(move |g| base + g as i64)
    }
}

/// A walk from `start` whose consecutive positions differ by at most
/// `max_step`. Dropping or shrinking a position can leave the next one out of
/// reach; the fixup clamps it back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedSteps {
    pub start: i64,
    pub max_step: i64,
}

impl OnePassInvariant for BoundedSteps {
    type Item = i64;
    type Acc = i64;

    fn initial(&self) -> i64 {
        self.start
    }

    fn step(&self, _acc: &i64, item: &i64) -> i64 {
        *item
    }

    fn accepts(&self, acc: &i64, item: &i64) -> bool {
        (item - acc).abs() <= self.max_step
    }

    fn fixup(&self, acc: &i64, item: &i64) -> i64 {
        (*item).clamp(acc - self.max_step, acc + self.max_step)
    }

    fn generate(&self, ctx: &mut GenContext, acc: &i64) -> GenResult<i64> {
        Ok(acc + ctx.int_in(-self.max_step, self.max_step))
    }

    fn shrink(&self, acc: &i64, item: &i64) -> Stream<i64> {
        let (acc, max_step) = (*acc, self.max_step);
        shrink_int(*item).filter(move |c| (c - acc).abs() <= max_step)
    }
}

/// Strictly increasing discretized floats of one role, starting at or after
/// `start_steps` quanta: sample times for a solver run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreasingTimes {
    pub role: FloatRole,
    pub start_steps: i64,
}

impl OnePassInvariant for IncreasingTimes {
    type Item = f64;
    /// Smallest admissible step count for the next item.
    type Acc = i64;

    fn initial(&self) -> i64 {
        self.start_steps
    }

    fn step(&self, _acc: &i64, item: &f64) -> i64 {
        self.role.steps(*item) + 1
    }

    fn accepts(&self, acc: &i64, item: &f64) -> bool {
        self.role.steps(*item) >= *acc
    }

    fn fixup(&self, acc: &i64, item: &f64) -> f64 {
        if self.accepts(acc, item) {
            *item
        } else {
            self.role.value(*acc)
        }
    }

    fn generate(&self, ctx: &mut GenContext, acc: &i64) -> GenResult<f64> {
        let gap = i64::try_from(ctx.nat()).unwrap_or(i64::MAX);
        Ok(self.role.value(acc.saturating_add(gap)))
    }

    fn shrink(&self, acc: &i64, item: &f64) -> Stream<f64> {
        let (base, role) = (*acc, self.role);
        let gap = usize::try_from(role.steps(*item) - base).unwrap_or(0);
        shrink_nat(gap).map(move |g| role.value(base + g as i64))
    }
}
