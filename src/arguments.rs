//! Arguments sink (component B): collects bound parameters for a render
//! pass, or rejects them outright in raw-SQL mode.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ident::Value;

/// Shared, reference-counted bag of bound arguments. Cloning an
/// `Arguments` shares the same underlying buffer, which is how nested
/// [`crate::context::GenerationContext`]s derived from one root
/// contribute to a single argument tuple.
#[derive(Debug, Clone)]
pub struct Arguments {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Debug)]
struct Inner {
    values: Vec<Value>,
    raw: bool,
}

impl Arguments {
    /// A sink that accepts bound values.
    pub fn bindable() -> Self {
        Arguments {
            inner: Rc::new(RefCell::new(Inner {
                values: Vec::new(),
                raw: false,
            })),
        }
    }

    /// A sink that forbids binding — any non-empty append is rejected.
    /// Used for `CREATE TABLE`/`CREATE VIEW` SQL, where values must be
    /// inlined as literals instead.
    pub fn raw() -> Self {
        Arguments {
            inner: Rc::new(RefCell::new(Inner {
                values: Vec::new(),
                raw: true,
            })),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.inner.borrow().raw
    }

    /// Appends `values` to the sink in order. Returns `false` iff the
    /// sink is in raw mode and `values` is non-empty; the caller must
    /// then render the values as literals or fail.
    #[must_use]
    pub fn append_arguments(&self, values: impl IntoIterator<Item = Value>) -> bool {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return true;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.raw {
            return false;
        }
        inner.values.extend(values);
        true
    }

    /// Appends a single value; see [`Self::append_arguments`].
    #[must_use]
    pub fn append_argument(&self, value: Value) -> bool {
        self.append_arguments(std::iter::once(value))
    }

    /// Consumes the sink, returning the collected arguments in
    /// left-to-right order. Only meaningful for the root sink of a
    /// render pass.
    pub fn into_values(self) -> Vec<Value> {
        Rc::try_unwrap(self.inner)
            .map(|cell| cell.into_inner().values)
            .unwrap_or_else(|rc| rc.borrow().values.clone())
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.borrow().values.clone()
    }
}
