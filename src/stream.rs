//! Persistent, lazily-forced streams.
//!
//! A [`Stream`] is a shared promise that, once forced, is either empty or a
//! head value followed by another stream. Forcing is memoized: the producer of
//! a node runs at most once, and every later traversal sees the same node.
//! Streams are cheap to clone (an `Rc` bump) and can be traversed any number of
//! times, which is what lets the minimizer hold on to a candidate stream while
//! testing its elements one by one.
//!
//! Streams are single-threaded by construction (`Rc` + `RefCell`).
//!
//! ```rust
//! use lazycheck::stream::Stream;
//!
//! let evens = Stream::iterate(0u64, |n| n + 1).filter(|n| n % 2 == 0);
//! assert_eq!(evens.take(3).to_vec(), vec![0, 2, 4]);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::error::{LengthMismatch, Side};

pub struct Stream<T> {
    cell: Rc<Promise<T>>,
}

struct Promise<T> {
    state: RefCell<State<T>>,
}

enum State<T> {
    Delayed(Box<dyn FnOnce() -> Node<T>>),
    Forcing,
    Ready(Node<T>),
}

enum Node<T> {
    Nil,
    Cons(T, Stream<T>),
}

impl<T: Clone> Node<T> {
    fn split(&self) -> Option<(T, Stream<T>)> {
        match self {
            Node::Nil => None,
            Node::Cons(head, tail) => Some((head.clone(), tail.clone())),
        }
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> Drop for Stream<T> {
    // Unlink uniquely owned forced tails one at a time so that dropping a long
    // chain does not recurse once per node.
    fn drop(&mut self) {
        let mut next = detach_tail(&mut self.cell);
        while let Some(mut stream) = next {
            next = detach_tail(&mut stream.cell);
        }
    }
}

fn detach_tail<T>(cell: &mut Rc<Promise<T>>) -> Option<Stream<T>> {
    let promise = Rc::get_mut(cell)?;
    match mem::replace(promise.state.get_mut(), State::Forcing) {
        State::Ready(Node::Cons(_, tail)) => Some(tail),
        _ => None,
    }
}

impl<T: Clone + 'static> Stream<T> {
    fn ready(node: Node<T>) -> Self {
        Stream {
            cell: Rc::new(Promise {
                state: RefCell::new(State::Ready(node)),
            }),
        }
    }

    fn suspend<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Node<T> + 'static,
    {
        Stream {
            cell: Rc::new(Promise {
                state: RefCell::new(State::Delayed(Box::new(thunk))),
            }),
        }
    }

    /// The empty stream.
    pub fn empty() -> Self {
        Self::ready(Node::Nil)
    }

    /// Prepend `head` to `tail` without forcing `tail`.
    pub fn cons(head: T, tail: Stream<T>) -> Self {
        Self::ready(Node::Cons(head, tail))
    }

    pub fn singleton(value: T) -> Self {
        Self::cons(value, Self::empty())
    }

    /// Suspend the construction of a whole stream until it is first forced.
    pub fn delay<F>(make: F) -> Self
    where
        F: FnOnce() -> Stream<T> + 'static,
    {
        Self::suspend(move || make().node())
    }

    /// Force one level and copy the resulting node.
    fn node(&self) -> Node<T> {
        match self.uncons() {
            Some((head, tail)) => Node::Cons(head, tail),
            None => Node::Nil,
        }
    }

    /// Force one level, returning the head and the (unforced) rest.
    ///
    /// # Panics
    ///
    /// Panics if the node is forced from within its own producer, or if an
    /// earlier attempt to force it panicked.
    pub fn uncons(&self) -> Option<(T, Stream<T>)> {
        let state = mem::replace(&mut *self.cell.state.borrow_mut(), State::Forcing);
        let node = match state {
            State::Ready(node) => node,
            State::Delayed(thunk) => thunk(),
            State::Forcing => panic!("stream node forced re-entrantly or after its producer panicked"),
        };
        let split = node.split();
        *self.cell.state.borrow_mut() = State::Ready(node);
        split
    }

    pub fn is_empty(&self) -> bool {
        self.uncons().is_none()
    }

    pub fn head(&self) -> Option<T> {
        self.uncons().map(|(head, _)| head)
    }

    pub fn iter(&self) -> Iter<T> {
        Iter {
            cursor: self.clone(),
        }
    }

    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> U + 'static,
    {
        map_with(self.clone(), Rc::new(f))
    }

    pub fn filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        filter_with(self.clone(), Rc::new(predicate))
    }

    pub fn filter_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> Option<U> + 'static,
    {
        filter_map_with(self.clone(), Rc::new(f))
    }

    pub fn flat_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> Stream<U> + 'static,
    {
        Stream::concat(&self.map(f))
    }

    /// Pair up elements of two streams, stopping at the end of the shorter.
    pub fn zip_with<U, V, F>(&self, other: &Stream<U>, f: F) -> Stream<V>
    where
        U: Clone + 'static,
        V: Clone + 'static,
        F: Fn(T, U) -> V + 'static,
    {
        zip_with_rc(self.clone(), other.clone(), Rc::new(f))
    }

    /// Like [`zip_with`](Stream::zip_with), but a length difference is
    /// reported as a final `Err(LengthMismatch)` element naming the side that
    /// still had elements left.
    pub fn zip_with_strict<U, V, F>(&self, other: &Stream<U>, f: F) -> Stream<Result<V, LengthMismatch>>
    where
        U: Clone + 'static,
        V: Clone + 'static,
        F: Fn(T, U) -> V + 'static,
    {
        zip_strict_rc(self.clone(), other.clone(), Rc::new(f))
    }

    pub fn append(&self, other: &Stream<T>) -> Stream<T> {
        let front = self.clone();
        let back = other.clone();
        Self::suspend(move || match front.uncons() {
            Some((head, rest)) => Node::Cons(head, rest.append(&back)),
            None => back.node(),
        })
    }

    /// Flatten a stream of streams, preserving order.
    pub fn concat(streams: &Stream<Stream<T>>) -> Stream<T> {
        let outer = streams.clone();
        Self::suspend(move || {
            let mut cursor = outer;
            while let Some((inner, rest)) = cursor.uncons() {
                if let Some((head, tail)) = inner.uncons() {
                    return Node::Cons(head, tail.append(&Stream::concat(&rest)));
                }
                cursor = rest;
            }
            Node::Nil
        })
    }

    pub fn take(&self, count: usize) -> Stream<T> {
        if count == 0 {
            return Self::empty();
        }
        let source = self.clone();
        Self::suspend(move || match source.uncons() {
            Some((head, rest)) => Node::Cons(head, rest.take(count - 1)),
            None => Node::Nil,
        })
    }

    pub fn take_while<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        take_while_with(self.clone(), Rc::new(predicate))
    }

    pub fn drop_while<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let source = self.clone();
        Self::suspend(move || {
            let mut cursor = source;
            while let Some((head, rest)) = cursor.uncons() {
                if !predicate(&head) {
                    return Node::Cons(head, rest);
                }
                cursor = rest;
            }
            Node::Nil
        })
    }

    /// Strict left fold. Does not terminate on infinite streams.
    pub fn fold<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, T) -> A,
    {
        self.iter().fold(init, f)
    }

    /// First element satisfying `predicate`; forces nothing past it.
    pub fn find<P>(&self, mut predicate: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().find(|item| predicate(item))
    }

    /// First `Some` produced by `f`; forces nothing past it.
    pub fn find_map<U, F>(&self, f: F) -> Option<U>
    where
        F: FnMut(T) -> Option<U>,
    {
        self.iter().find_map(f)
    }

    /// Build a stream from a stateful step function. The step function runs
    /// once per element, in order, no matter how often the stream is traversed.
    pub fn generate<F>(step: F) -> Stream<T>
    where
        F: FnMut() -> Option<T> + 'static,
    {
        generate_from(Rc::new(RefCell::new(step)))
    }

    /// Build a stream by threading a seed through a pure step function.
    pub fn unfold<S, F>(seed: S, step: F) -> Stream<T>
    where
        S: 'static,
        F: Fn(S) -> Option<(T, S)> + 'static,
    {
        unfold_from(seed, Rc::new(step))
    }

    /// The infinite stream `x0, f(x0), f(f(x0)), ...`.
    pub fn iterate<F>(x0: T, f: F) -> Stream<T>
    where
        F: Fn(&T) -> T + 'static,
    {
        Self::ready(iterate_from(x0, Rc::new(f)))
    }

    pub fn from_vec(items: Vec<T>) -> Stream<T> {
        items
            .into_iter()
            .rev()
            .fold(Self::empty(), |tail, head| Self::cons(head, tail))
    }

    /// Force the whole stream into a vector. Does not terminate on infinite streams.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

fn map_with<T, U, F>(source: Stream<T>, f: Rc<F>) -> Stream<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(T) -> U + 'static,
{
    Stream::suspend(move || match source.uncons() {
        Some((head, rest)) => {
            let mapped = (*f)(head);
            Node::Cons(mapped, map_with(rest, f))
        }
        None => Node::Nil,
    })
}

fn filter_with<T, P>(source: Stream<T>, predicate: Rc<P>) -> Stream<T>
where
    T: Clone + 'static,
    P: Fn(&T) -> bool + 'static,
{
    Stream::suspend(move || {
        let mut cursor = source;
        while let Some((head, rest)) = cursor.uncons() {
            if (*predicate)(&head) {
                return Node::Cons(head, filter_with(rest, predicate));
            }
            cursor = rest;
        }
        Node::Nil
    })
}

fn filter_map_with<T, U, F>(source: Stream<T>, f: Rc<F>) -> Stream<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(T) -> Option<U> + 'static,
{
    Stream::suspend(move || {
        let mut cursor = source;
        while let Some((head, rest)) = cursor.uncons() {
            if let Some(mapped) = (*f)(head) {
                return Node::Cons(mapped, filter_map_with(rest, f));
            }
            cursor = rest;
        }
        Node::Nil
    })
}

fn take_while_with<T, P>(source: Stream<T>, predicate: Rc<P>) -> Stream<T>
where
    T: Clone + 'static,
    P: Fn(&T) -> bool + 'static,
{
    Stream::suspend(move || match source.uncons() {
        Some((head, rest)) if (*predicate)(&head) => Node::Cons(head, take_while_with(rest, predicate)),
        _ => Node::Nil,
    })
}

fn zip_with_rc<T, U, V, F>(left: Stream<T>, right: Stream<U>, f: Rc<F>) -> Stream<V>
where
    T: Clone + 'static,
    U: Clone + 'static,
    V: Clone + 'static,
    F: Fn(T, U) -> V + 'static,
{
    Stream::suspend(move || {
        let Some((x, left_rest)) = left.uncons() else {
            return Node::Nil;
        };
        match right.uncons() {
            Some((y, right_rest)) => Node::Cons((*f)(x, y), zip_with_rc(left_rest, right_rest, f)),
            None => Node::Nil,
        }
    })
}

fn zip_strict_rc<T, U, V, F>(left: Stream<T>, right: Stream<U>, f: Rc<F>) -> Stream<Result<V, LengthMismatch>>
where
    T: Clone + 'static,
    U: Clone + 'static,
    V: Clone + 'static,
    F: Fn(T, U) -> V + 'static,
{
    Stream::suspend(move || match (left.uncons(), right.uncons()) {
        (None, None) => Node::Nil,
        (Some(_), None) => Node::Cons(Err(LengthMismatch { side: Side::Left }), Stream::empty()),
        (None, Some(_)) => Node::Cons(Err(LengthMismatch { side: Side::Right }), Stream::empty()),
        (Some((x, left_rest)), Some((y, right_rest))) => {
            Node::Cons(Ok((*f)(x, y)), zip_strict_rc(left_rest, right_rest, f))
        }
    })
}

fn generate_from<T, F>(step: Rc<RefCell<F>>) -> Stream<T>
where
    T: Clone + 'static,
    F: FnMut() -> Option<T> + 'static,
{
    Stream::suspend(move || {
        let next = {
            let mut step_fn = step.borrow_mut();
            (*step_fn)()
        };
        match next {
            Some(item) => Node::Cons(item, generate_from(step)),
            None => Node::Nil,
        }
    })
}

fn unfold_from<T, S, F>(seed: S, step: Rc<F>) -> Stream<T>
where
    T: Clone + 'static,
    S: 'static,
    F: Fn(S) -> Option<(T, S)> + 'static,
{
    Stream::suspend(move || match (*step)(seed) {
        Some((item, next_seed)) => Node::Cons(item, unfold_from(next_seed, step)),
        None => Node::Nil,
    })
}

fn iterate_from<T, F>(x: T, f: Rc<F>) -> Node<T>
where
    T: Clone + 'static,
    F: Fn(&T) -> T + 'static,
{
    let seed = x.clone();
    Node::Cons(x, Stream::suspend(move || iterate_from((*f)(&seed), f)))
}

/// Iterator over a stream. Holds a clone of the stream, so the stream itself
/// remains traversable afterwards.
pub struct Iter<T> {
    cursor: Stream<T>,
}

impl<T: Clone + 'static> Iterator for Iter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let (head, rest) = self.cursor.uncons()?;
        self.cursor = rest;
        Some(head)
    }
}

impl<'a, T: Clone + 'static> IntoIterator for &'a Stream<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

impl<T: Clone + 'static> FromIterator<T> for Stream<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Stream::from_vec(iter.into_iter().collect())
    }
}

impl<T: Clone + 'static> Default for Stream<T> {
    fn default() -> Self {
        Stream::empty()
    }
}

/// Shows the already-forced prefix only; never forces anything.
impl<T: fmt::Debug> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut cursor = self.clone();
        loop {
            let next = match &*cursor.cell.state.borrow() {
                State::Ready(Node::Cons(head, tail)) => {
                    list.entry(head);
                    Some(tail.clone())
                }
                State::Ready(Node::Nil) => None,
                _ => {
                    list.entry(&format_args!(".."));
                    None
                }
            };
            match next {
                Some(tail) => cursor = tail,
                None => break,
            }
        }
        list.finish()
    }
}
