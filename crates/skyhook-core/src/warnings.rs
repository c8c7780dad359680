//! Warning accumulation for remote operations.
//!
//! Every platform call can return human-readable warnings, even when it
//! fails. They are collected in call order and handed back to the caller
//! together with the outcome.

use std::fmt;

/// Ordered list of non-fatal messages.
///
/// Warnings are never deduplicated or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    /// Append the warnings of `reply` and hand back its result.
    pub fn absorb<T, E>(&mut self, reply: Warned<T, E>) -> Result<T, E> {
        self.extend(reply.warnings);
        reply.result
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Warnings {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<S: Into<String>> FromIterator<S> for Warnings {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for Warnings {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("\n"))
    }
}

/// An outcome paired with every warning produced while reaching it.
#[derive(Debug)]
#[must_use]
pub struct Warned<T, E> {
    pub result: Result<T, E>,
    pub warnings: Warnings,
}

impl<T, E> Warned<T, E> {
    pub fn new(result: Result<T, E>, warnings: Warnings) -> Self {
        Self { result, warnings }
    }

    pub fn ok(value: T, warnings: Warnings) -> Self {
        Self {
            result: Ok(value),
            warnings,
        }
    }

    pub fn err(error: E, warnings: Warnings) -> Self {
        Self {
            result: Err(error),
            warnings,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// Convert the error type, keeping warnings untouched.
    pub fn map_err<F>(self, op: impl FnOnce(E) -> F) -> Warned<T, F> {
        Warned {
            result: self.result.map_err(op),
            warnings: self.warnings,
        }
    }

    pub fn map<U>(self, op: impl FnOnce(T) -> U) -> Warned<U, E> {
        Warned {
            result: self.result.map(op),
            warnings: self.warnings,
        }
    }

    pub fn into_parts(self) -> (Result<T, E>, Warnings) {
        (self.result, self.warnings)
    }
}
