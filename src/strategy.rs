//! Generator/shrinker pairs.
//!
//! A [`Strategy`] bundles how to draw a value with how to simplify it, so the
//! driver and the minimizer never have to be told the two separately.

use std::rc::Rc;

use crate::gen::{self, FloatRole, Gen, GenContext, GenResult};
use crate::one_pass::{self, OnePassInvariant};
use crate::shrink::{self, Shrinker};
use crate::stream::Stream;

pub struct Strategy<T> {
    gen: Gen<T>,
    shrinker: Shrinker<T>,
}

impl<T> Clone for Strategy<T> {
    fn clone(&self) -> Self {
        Strategy {
            gen: self.gen.clone(),
            shrinker: Rc::clone(&self.shrinker),
        }
    }
}

impl<T: Clone + 'static> Strategy<T> {
    pub fn new(gen: Gen<T>, shrinker: Shrinker<T>) -> Self {
        Strategy { gen, shrinker }
    }

    /// A strategy whose values are reported exactly as generated.
    pub fn unshrinkable(gen: Gen<T>) -> Self {
        Strategy::new(gen, shrink::no_shrink())
    }

    pub fn gen(&self) -> &Gen<T> {
        &self.gen
    }

    pub fn shrinker(&self) -> &Shrinker<T> {
        &self.shrinker
    }

    pub fn generate(&self, ctx: &mut GenContext) -> GenResult<T> {
        self.gen.generate(ctx)
    }

    pub fn shrink(&self, value: &T) -> Stream<T> {
        (self.shrinker)(value)
    }

    /// Restrict both generation and shrinking to values satisfying
    /// `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Strategy<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let predicate = Rc::new(predicate);
        let keep = Rc::clone(&predicate);
        let inner = Rc::clone(&self.shrinker);
        Strategy {
            gen: self.gen.filter(move |x| predicate(x)),
            shrinker: shrink::shrinker(move |x| {
                let keep = Rc::clone(&keep);
                inner(x).filter(move |c| keep(c))
            }),
        }
    }
}

pub fn bools() -> Strategy<bool> {
    Strategy::new(gen::bools(), shrink::shrinker(|b: &bool| shrink::shrink_bool(*b)))
}

pub fn nats() -> Strategy<usize> {
    Strategy::new(gen::nats(), shrink::shrinker(|n: &usize| shrink::shrink_nat(*n)))
}

pub fn ints() -> Strategy<i64> {
    Strategy::new(gen::ints(), shrink::shrinker(|n: &i64| shrink::shrink_int(*n)))
}

/// Integers in `lo..=hi`, shrinking towards the point of the range closest to
/// zero.
pub fn int_range(lo: i64, hi: i64) -> Strategy<i64> {
    let anchor = if lo <= hi { 0i64.clamp(lo, hi) } else { 0 };
    Strategy::new(
        gen::int_range(lo, hi),
        shrink::shrinker(move |n: &i64| {
            let offset = n.saturating_sub(anchor);
            shrink::shrink_int(offset)
                .map(move |d| anchor.saturating_add(d))
                .filter(move |c| (lo..=hi).contains(c))
        }),
    )
}

pub fn discrete_floats(role: FloatRole) -> Strategy<f64> {
    Strategy::new(
        gen::discrete_floats(role),
        shrink::shrinker(move |x: &f64| shrink::shrink_discrete_float(role, *x)),
    )
}

/// Variable-length lists, shrunk head first.
pub fn lists<T: Clone + 'static>(elem: Strategy<T>) -> Strategy<Vec<T>> {
    let shrinker = elem.shrinker;
    Strategy::new(
        gen::lists(elem.gen),
        shrink::shrinker(move |xs: &Vec<T>| shrink::shrink_list(xs, &shrinker)),
    )
}

pub fn fixed_lists<T: Clone + 'static>(len: usize, elem: Strategy<T>) -> Strategy<Vec<T>> {
    let shrinker = elem.shrinker;
    Strategy::new(
        gen::fixed_lists(len, elem.gen),
        shrink::shrinker(move |xs: &Vec<T>| shrink::shrink_fixed_size_list(xs, &shrinker)),
    )
}

/// Variable-length arrays: removals are tried before element shrinks.
pub fn arrays<T: Clone + 'static>(elem: Strategy<T>) -> Strategy<Vec<T>> {
    let shrinker = elem.shrinker;
    Strategy::new(
        gen::lists(elem.gen),
        shrink::shrinker(move |xs: &Vec<T>| shrink::shrink_array(xs, &shrinker)),
    )
}

pub fn fixed_arrays<T: Clone + 'static>(len: usize, elem: Strategy<T>) -> Strategy<Vec<T>> {
    let shrinker = elem.shrinker;
    Strategy::new(
        gen::fixed_lists(len, elem.gen),
        shrink::shrinker(move |xs: &Vec<T>| shrink::shrink_fixed_size_array(xs, &shrinker)),
    )
}

pub fn pairs<A, B>(first: Strategy<A>, second: Strategy<B>) -> Strategy<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (left, right) = (first.shrinker, second.shrinker);
    Strategy::new(
        gen::pairs(first.gen, second.gen),
        shrink::shrinker(move |pair: &(A, B)| shrink::shrink_pair(pair, &left, &right)),
    )
}

/// Lists that satisfy `invariant` by construction and stay valid while
/// shrinking.
pub fn one_pass_lists<I: OnePassInvariant>(invariant: I) -> Strategy<Vec<I::Item>> {
    let invariant = Rc::new(invariant);
    let shrinking = Rc::clone(&invariant);
    Strategy::new(
        one_pass::gen_1pass_list(invariant),
        shrink::shrinker(move |xs: &Vec<I::Item>| one_pass::shrink_1pass_list(&shrinking, xs)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::one_pass::{holds, NonDecreasing};

    #[test]
    fn test_int_range_shrinks_inside_range() {
        let strategy = int_range(5, 20);
        assert_eq!(strategy.shrink(&17).head(), Some(5));
        for c in strategy.shrink(&17).iter() {
            assert!((5..=20).contains(&c));
        }
        let negative = int_range(-20, -5);
        assert_eq!(negative.shrink(&-12).head(), Some(-5));
        assert!(negative.shrink(&-5).is_empty());
    }

    #[test]
    fn test_filter_applies_to_shrinks() {
        let evens = ints().filter(|n| n % 2 == 0);
        for c in evens.shrink(&100).iter() {
            assert_eq!(c % 2, 0);
        }
        let mut ctx = GenContext::new(9, 30);
        for _ in 0..20 {
            assert_eq!(evens.generate(&mut ctx).unwrap() % 2, 0);
        }
    }

    #[test]
    fn test_unshrinkable() {
        let strategy = Strategy::unshrinkable(gen::constant(3u8));
        assert!(strategy.shrink(&3).is_empty());
    }

    #[test]
    fn test_one_pass_lists_round_trip_through_strategy() {
        let strategy = one_pass_lists(NonDecreasing { floor: 0 });
        let mut ctx = GenContext::new(4, 20);
        let value = strategy.generate(&mut ctx).unwrap();
        assert!(holds(&NonDecreasing { floor: 0 }, &value));
        for candidate in strategy.shrink(&value).iter() {
            assert!(holds(&NonDecreasing { floor: 0 }, &candidate));
        }
    }
}
