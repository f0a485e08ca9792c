//! Declared error identity: an immutable (code, message) pair.
//!
//! An [`Underlying`] names an error class. Two identities are considered
//! the same class when their codes match (if the receiver's code is
//! non-empty), else when their messages match (if the receiver's message
//! is non-empty), else never. Identities are shared via `Arc`, so two
//! separately constructed values with the same code are distinct objects
//! yet equal under [`Underlying::is`].

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::Error;

/// An immutable (code, message) pair naming a declared error class.
///
/// Construct via [`crate::declare`] to participate in code registration,
/// or via [`Underlying::new`] to bypass the registry.
#[derive(Debug)]
pub struct Underlying {
    code: String,
    message: String,
}

impl Underlying {
    /// Builds an identity directly, without touching the code registry.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Underlying {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Class comparison: codes when this code is non-empty, else messages
    /// when this message is non-empty, else false.
    pub fn same_class(&self, other: &Underlying) -> bool {
        if !self.code.is_empty() {
            return self.code == other.code;
        }
        if !self.message.is_empty() {
            return self.message == other.message;
        }
        false
    }

    /// Identity comparison against any error value. A node target is
    /// compared through its effective identity.
    pub fn is(&self, target: &Error) -> bool {
        match target {
            Error::Underlying(u) => self.same_class(u),
            Error::Node(n) => match n.underlying() {
                Some(Error::Underlying(theirs)) => theirs.same_class(self),
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for Underlying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// JSON form is the text form, `"<code>: <message>"`.
impl Serialize for Underlying {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
