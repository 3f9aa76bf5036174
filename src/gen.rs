//! Value generators.
//!
//! A [`Gen<T>`] synthesizes one `T` from a [`GenContext`], which carries the
//! ambient size and a seeded ChaCha8 random source. The size is an explicit
//! parameter rather than global state: the driver grows it with the attempt
//! index so early attempts stay small and cheap.

use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::GeneratorFailure;

/// Result of drawing one value.
pub type GenResult<T> = Result<T, GeneratorFailure>;

/// How many consecutive rejections `Gen::filter` tolerates before giving up.
pub const MAX_FILTER_REJECTIONS: usize = 100;

/// Step between consecutive discretized floats of the same role.
pub const QUANTUM: f64 = 0.125;

/// Minimum distance between the offsets of two distinct float roles.
pub const ROLE_SEPARATION: f64 = 2e-5;

/// Float tolerance of the result comparator: half the role separation, so two
/// discretized values of different roles can never compare equal.
pub const DEFAULT_EPSILON: f64 = ROLE_SEPARATION / 2.0;

/// Number of distinct roles that fit below one quantum.
pub const MAX_ROLES: u32 = 6250;

/// Generation state for a single attempt.
#[derive(Debug, Clone)]
pub struct GenContext {
    seed: u64,
    size: usize,
    rng: ChaCha8Rng,
}

impl GenContext {
    pub fn new(seed: u64, size: usize) -> Self {
        Self {
            seed,
            size,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Uniform natural number in `0..=size`.
    pub fn nat(&mut self) -> usize {
        let size = self.size;
        self.rng.gen_range(0..=size)
    }

    /// Uniform integer in `lo..=hi`. Callers guarantee `lo <= hi`.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform index in `0..bound`. Callers guarantee `bound > 0`.
    pub fn below(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }

    pub fn weighted(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }
}

/// A generator of `T` values. Cloning shares the underlying closure.
pub struct Gen<T> {
    run: Rc<dyn Fn(&mut GenContext) -> GenResult<T>>,
}

impl<T> Clone for Gen<T> {
    fn clone(&self) -> Self {
        Gen {
            run: Rc::clone(&self.run),
        }
    }
}

impl<T: 'static> Gen<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut GenContext) -> GenResult<T> + 'static,
    {
        Gen { run: Rc::new(f) }
    }

    /// Wrap an infallible drawing function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut GenContext) -> T + 'static,
    {
        Gen::new(move |ctx| Ok(f(ctx)))
    }

    pub fn generate(&self, ctx: &mut GenContext) -> GenResult<T> {
        (self.run)(ctx)
    }

    pub fn map<U, F>(&self, f: F) -> Gen<U>
    where
        U: 'static,
        F: Fn(T) -> U + 'static,
    {
        let inner = self.clone();
        Gen::new(move |ctx| inner.generate(ctx).map(&f))
    }

    pub fn and_then<U, F>(&self, f: F) -> Gen<U>
    where
        U: 'static,
        F: Fn(T) -> Gen<U> + 'static,
    {
        let inner = self.clone();
        Gen::new(move |ctx| {
            let value = inner.generate(ctx)?;
            f(value).generate(ctx)
        })
    }

    /// Redraw until `predicate` holds, failing after
    /// [`MAX_FILTER_REJECTIONS`] consecutive rejections.
    pub fn filter<P>(&self, predicate: P) -> Gen<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let inner = self.clone();
        Gen::new(move |ctx| {
            for _ in 0..MAX_FILTER_REJECTIONS {
                let value = inner.generate(ctx)?;
                if predicate(&value) {
                    return Ok(value);
                }
            }
            Err(GeneratorFailure::Exhausted {
                rejected: MAX_FILTER_REJECTIONS,
            })
        })
    }

    /// Run with a fixed size, restoring the ambient size afterwards.
    pub fn resize(&self, size: usize) -> Gen<T> {
        self.scale(move |_| size)
    }

    pub fn scale<F>(&self, f: F) -> Gen<T>
    where
        F: Fn(usize) -> usize + 'static,
    {
        let inner = self.clone();
        Gen::new(move |ctx| {
            let ambient = ctx.size();
            ctx.set_size(f(ambient));
            let result = inner.generate(ctx);
            ctx.set_size(ambient);
            result
        })
    }
}

/// Build a generator from the ambient size.
pub fn sized<T, F>(f: F) -> Gen<T>
where
    T: 'static,
    F: Fn(usize) -> Gen<T> + 'static,
{
    Gen::new(move |ctx| f(ctx.size()).generate(ctx))
}

pub fn constant<T: Clone + 'static>(value: T) -> Gen<T> {
    Gen::from_fn(move |_| value.clone())
}

pub fn bools() -> Gen<bool> {
    Gen::from_fn(|ctx| ctx.weighted(0.5))
}

/// Naturals in `0..=size`.
pub fn nats() -> Gen<usize> {
    Gen::from_fn(GenContext::nat)
}

/// Integers in `-size..=size`.
pub fn ints() -> Gen<i64> {
    Gen::from_fn(|ctx| {
        let bound = i64::try_from(ctx.size()).unwrap_or(i64::MAX);
        ctx.int_in(-bound, bound)
    })
}

/// Integers in `lo..=hi`, independent of size.
pub fn int_range(lo: i64, hi: i64) -> Gen<i64> {
    Gen::new(move |ctx| {
        if lo > hi {
            return Err(GeneratorFailure::Invalid(format!("empty range {}..={}", lo, hi)));
        }
        Ok(ctx.int_in(lo, hi))
    })
}

/// Pick one of `items` uniformly.
pub fn choose<T: Clone + 'static>(items: Vec<T>) -> Gen<T> {
    Gen::new(move |ctx| {
        if items.is_empty() {
            return Err(GeneratorFailure::Invalid("choose from an empty list".to_string()));
        }
        Ok(items[ctx.below(items.len())].clone())
    })
}

/// Delegate to one of `gens`, chosen uniformly.
pub fn one_of<T: 'static>(gens: Vec<Gen<T>>) -> Gen<T> {
    Gen::new(move |ctx| {
        if gens.is_empty() {
            return Err(GeneratorFailure::Invalid("one_of with no generators".to_string()));
        }
        gens[ctx.below(gens.len())].generate(ctx)
    })
}

/// Delegate to one of `gens` with probability proportional to its weight.
pub fn frequency<T: 'static>(gens: Vec<(u32, Gen<T>)>) -> Gen<T> {
    let total: u64 = gens.iter().map(|(weight, _)| u64::from(*weight)).sum();
    Gen::new(move |ctx| {
        if total == 0 {
            return Err(GeneratorFailure::Invalid("frequency with zero total weight".to_string()));
        }
        let mut pick = ctx.rng().gen_range(0..total);
        for (weight, gen) in &gens {
            let weight = u64::from(*weight);
            if pick < weight {
                return gen.generate(ctx);
            }
            pick -= weight;
        }
        Err(GeneratorFailure::Invalid("frequency weights changed during generation".to_string()))
    })
}

/// Lists of length `0..=size`.
pub fn lists<T: 'static>(elem: Gen<T>) -> Gen<Vec<T>> {
    Gen::new(move |ctx| {
        let len = ctx.nat();
        (0..len).map(|_| elem.generate(ctx)).collect()
    })
}

pub fn fixed_lists<T: 'static>(len: usize, elem: Gen<T>) -> Gen<Vec<T>> {
    Gen::new(move |ctx| (0..len).map(|_| elem.generate(ctx)).collect())
}

pub fn pairs<A: 'static, B: 'static>(first: Gen<A>, second: Gen<B>) -> Gen<(A, B)> {
    Gen::new(move |ctx| {
        let a = first.generate(ctx)?;
        let b = second.generate(ctx)?;
        Ok((a, b))
    })
}

/// A semantic role for discretized floats. Values of different roles are
/// always at least [`ROLE_SEPARATION`] apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatRole {
    name: &'static str,
    index: u32,
}

impl FloatRole {
    /// # Panics
    ///
    /// Panics if `index >= MAX_ROLES`.
    pub const fn new(name: &'static str, index: u32) -> Self {
        assert!(index < MAX_ROLES, "float role index out of range");
        FloatRole { name, index }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offset(&self) -> f64 {
        f64::from(self.index) * ROLE_SEPARATION
    }

    /// The value `steps * QUANTUM + offset`.
    pub fn value(&self, steps: i64) -> f64 {
        steps as f64 * QUANTUM + self.offset()
    }

    /// Inverse of [`value`](FloatRole::value) for values of this role.
    pub fn steps(&self, value: f64) -> i64 {
        ((value - self.offset()) / QUANTUM).round() as i64
    }
}

/// Discretized floats: `k * QUANTUM + role.offset()` with `k` in `-size..=size`.
pub fn discrete_floats(role: FloatRole) -> Gen<f64> {
    ints().map(move |steps| role.value(steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIME: FloatRole = FloatRole::new("time", 0);
    const STEP: FloatRole = FloatRole::new("step", 1);
    const LAST: FloatRole = FloatRole::new("last", MAX_ROLES - 1);

    fn draw<T: 'static>(gen: &Gen<T>, seed: u64, size: usize) -> T {
        gen.generate(&mut GenContext::new(seed, size)).unwrap()
    }

    #[test]
    fn test_same_seed_same_values() {
        let gen = lists(ints());
        for seed in 0..20 {
            assert_eq!(draw(&gen, seed, 30), draw(&gen, seed, 30));
        }
    }

    #[test]
    fn test_size_bounds_nats_ints_and_lists() {
        for seed in 0..200 {
            let size = (seed % 13) as usize;
            assert!(draw(&nats(), seed, size) <= size);
            assert!(draw(&ints(), seed, size).unsigned_abs() as usize <= size);
            assert!(draw(&lists(bools()), seed, size).len() <= size);
        }
    }

    #[test]
    fn test_size_zero_is_trivial() {
        assert_eq!(draw(&ints(), 7, 0), 0);
        assert!(draw(&lists(ints()), 7, 0).is_empty());
    }

    #[test]
    fn test_int_range_and_empty_range() {
        for seed in 0..100 {
            let x = draw(&int_range(-3, 5), seed, 0);
            assert!((-3..=5).contains(&x));
        }
        let err = int_range(2, 1).generate(&mut GenContext::new(0, 0));
        assert!(matches!(err, Err(GeneratorFailure::Invalid(_))));
    }

    #[test]
    fn test_filter_exhaustion_is_an_error() {
        let never = nats().filter(|_| false);
        let err = never.generate(&mut GenContext::new(1, 10));
        assert_eq!(err, Err(GeneratorFailure::Exhausted { rejected: MAX_FILTER_REJECTIONS }));
    }

    #[test]
    fn test_choose_and_frequency() {
        let empty: Gen<u8> = choose(Vec::new());
        assert!(empty.generate(&mut GenContext::new(0, 0)).is_err());

        let only_b = frequency(vec![(0, constant('a')), (3, constant('b'))]);
        for seed in 0..50 {
            assert_eq!(draw(&only_b, seed, 5), 'b');
        }
    }

    #[test]
    fn test_resize_restores_ambient_size() {
        let gen = pairs(nats().resize(1000), sized(|size| constant(size)));
        let (_, ambient) = draw(&gen, 3, 4);
        assert_eq!(ambient, 4);
    }

    #[test]
    fn test_discrete_floats_are_quantized() {
        for seed in 0..100 {
            let x = draw(&discrete_floats(STEP), seed, 50);
            let steps = STEP.steps(x);
            assert_eq!(STEP.value(steps), x);
            assert!(steps.unsigned_abs() <= 50);
        }
    }

    #[test]
    fn test_roles_never_collide() {
        for seed in 0..300 {
            let a = draw(&discrete_floats(TIME), seed, 40);
            let b = draw(&discrete_floats(STEP), seed + 1000, 40);
            let c = draw(&discrete_floats(LAST), seed + 2000, 40);
            assert!((a - b).abs() >= DEFAULT_EPSILON, "{} vs {}", a, b);
            assert!((a - c).abs() >= DEFAULT_EPSILON, "{} vs {}", a, c);
            assert!((b - c).abs() >= DEFAULT_EPSILON, "{} vs {}", b, c);
        }
    }
}
