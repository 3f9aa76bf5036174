//! Properties under test.

use std::fmt;
use std::panic;
use std::rc::Rc;

use crate::result_model::{Comparator, ResultValue};

/// `Ok(())` when the property holds, otherwise the reason it does not.
pub type Verdict = Result<(), String>;

/// A named check over inputs of type `T`.
pub struct Property<T> {
    name: String,
    check: Rc<dyn Fn(&T) -> Verdict>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Property {
            name: self.name.clone(),
            check: Rc::clone(&self.check),
        }
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("name", &self.name).finish()
    }
}

impl<T: 'static> Property<T> {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&T) -> Verdict + 'static,
    {
        Property {
            name: name.into(),
            check: Rc::new(check),
        }
    }

    /// A property from a boolean predicate; a `false` is reported with the
    /// property's name.
    pub fn predicate<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        let name = name.into();
        let reason = format!("{} does not hold", name);
        Property::new(name, move |input| if predicate(input) { Ok(()) } else { Err(reason.clone()) })
    }

    /// A property that computes an expected and an actual [`ResultValue`]
    /// and holds when they match under `comparator`.
    ///
    /// A pattern on the actual side is a bug in the property, not a
    /// counterexample. It is raised as a [`UsageError`](crate::error::UsageError)
    /// panic payload, which the sandbox reports as `TestOutcome::Misused` and
    /// the runner turns into an aborted run.
    pub fn expecting<F>(name: impl Into<String>, comparator: Comparator, compute: F) -> Self
    where
        F: Fn(&T) -> (ResultValue, ResultValue) + 'static,
    {
        Property::new(name, move |input| {
            let (expected, actual) = compute(input);
            match comparator.try_matches(&expected, &actual) {
                Ok(true) => Ok(()),
                Ok(false) => Err(format!("expected {}, got {}", expected, actual)),
                Err(err) => panic::panic_any(err),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check directly, without any fault isolation.
    pub fn check(&self, input: &T) -> Verdict {
        (self.check)(input)
    }
}
