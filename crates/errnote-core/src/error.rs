//! The polymorphic error value.
//!
//! Everything the engine handles is one of a closed set of variants:
//! an opaque foreign error, a declared identity, a cause [`Node`], or a
//! [`Batch`] of independent failures. The variants share a small
//! capability surface (text form, optional identity, optional
//! comparison) instead of open-ended downcasting.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::batch::Batch;
use crate::node::Node;
use crate::underlying::Underlying;

/// An error value: opaque, identity, cause node, or batch.
#[derive(Debug)]
pub enum Error {
    /// A foreign error with no identity of its own.
    Opaque(Box<dyn StdError + Send + Sync>),
    /// A declared error class.
    Underlying(Arc<Underlying>),
    /// A causal wrapper; see [`Node`].
    Node(Box<Node>),
    /// Multiple independent failures; see [`Batch`].
    Batch(Batch),
}

/// A plain text error, for opaque messages with no foreign type behind
/// them.
#[derive(Debug)]
struct TextError(String);

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for TextError {}

impl Error {
    /// Opaque error from any displayable value.
    pub fn msg(message: impl fmt::Display) -> Error {
        Error::Opaque(Box::new(TextError(message.to_string())))
    }

    /// Wraps a foreign error without annotating it.
    pub fn opaque(err: impl StdError + Send + Sync + 'static) -> Error {
        Error::Opaque(Box::new(err))
    }

    /// Resolved machine code; empty for variants that carry none.
    pub fn code(&self) -> &str {
        match self {
            Error::Underlying(u) => u.code(),
            Error::Node(n) => n.code(),
            Error::Opaque(_) | Error::Batch(_) => "",
        }
    }

    /// Resolved human message; empty for variants that carry none.
    pub fn message(&self) -> &str {
        match self {
            Error::Underlying(u) => u.message(),
            Error::Node(n) => n.message(),
            Error::Opaque(_) | Error::Batch(_) => "",
        }
    }

    /// Identity comparison. Identities compare by class, nodes through
    /// their effective identities, opaque errors by allocation, batches
    /// never.
    pub fn is(&self, target: &Error) -> bool {
        match self {
            Error::Underlying(u) => u.is(target),
            Error::Node(n) => n.is(target),
            Error::Opaque(e) => match target {
                Error::Opaque(t) => same_allocation(e.as_ref(), t.as_ref()),
                _ => false,
            },
            Error::Batch(_) => false,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Error::Node(n) => Some(n),
            _ => None,
        }
    }
}

fn same_allocation(
    a: &(dyn StdError + Send + Sync),
    b: &(dyn StdError + Send + Sync),
) -> bool {
    std::ptr::eq(a as *const _ as *const u8, b as *const _ as *const u8)
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Opaque(e) => e.fmt(f),
            Error::Underlying(u) => u.fmt(f),
            Error::Node(n) => f.write_str(&n.render_message()),
            Error::Batch(b) => b.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Node(n) => n.cause().map(|c| c as &(dyn StdError + 'static)),
            Error::Opaque(e) => e.source(),
            _ => None,
        }
    }
}

impl From<Arc<Underlying>> for Error {
    fn from(u: Arc<Underlying>) -> Error {
        Error::Underlying(u)
    }
}

impl From<Node> for Error {
    fn from(n: Node) -> Error {
        Error::Node(Box::new(n))
    }
}

impl From<Batch> for Error {
    fn from(b: Batch) -> Error {
        Error::Batch(b)
    }
}

/// Identity comparison between any two error values.
pub fn is(src: &Error, target: &Error) -> bool {
    src.is(target)
}

/// Field lookup on an error; `None` unless the error is a node. See
/// [`Node::data`] for the recursive search order.
pub fn data(src: &Error, key: &str, recursive: bool) -> Option<Value> {
    src.as_node().and_then(|n| n.data(key, recursive))
}

/// Whether a field with `key` exists on the error.
pub fn has_data(src: &Error, key: &str, recursive: bool) -> bool {
    src.as_node().map_or(false, |n| n.has_data(key, recursive))
}

/// Whether `src` is, or is caused by, the target class. A node source
/// walks its chain (see [`Node::caused_by`]); anything else compares
/// directly.
pub fn caused_by(src: &Error, target: &Error, deep_first: bool) -> bool {
    match src {
        Error::Node(n) => n.caused_by(target, deep_first).is_some(),
        _ => src.is(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_is_send_and_sync() {
        assert_send_sync::<Error>();
    }

    #[test]
    fn opaque_equality_is_by_allocation() {
        let e = Error::msg("boom");
        let f = Error::msg("boom");
        assert!(e.is(&e));
        assert!(!e.is(&f));
    }

    #[test]
    fn identity_variant_exposes_code_and_message() {
        let e = Error::Underlying(Arc::new(Underlying::new("E1", "one")));
        assert_eq!(e.code(), "E1");
        assert_eq!(e.message(), "one");
        assert_eq!(e.to_string(), "E1: one");
    }

    #[test]
    fn opaque_variant_has_no_identity() {
        let e = Error::msg("plain");
        assert_eq!(e.code(), "");
        assert_eq!(e.message(), "");
        assert_eq!(e.to_string(), "plain");
    }

    #[test]
    fn source_walks_into_node_cause() {
        let wrapped = crate::annotate(Error::msg("root"), []).unwrap();
        let source = StdError::source(&wrapped).expect("node exposes its cause");
        assert_eq!(source.to_string(), "root");
    }

    #[test]
    fn foreign_errors_wrap_as_opaque() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "denied");
        let e = Error::opaque(io);
        assert!(matches!(e, Error::Opaque(_)));
        assert_eq!(e.to_string(), "denied");
    }

    #[test]
    fn caused_by_on_non_node_compares_directly() {
        let a = Error::Underlying(Arc::new(Underlying::new("E2", "two")));
        let b = Error::Underlying(Arc::new(Underlying::new("E2", "other")));
        assert!(caused_by(&a, &b, false));
        assert!(caused_by(&a, &b, true));
        assert!(!caused_by(&Error::msg("x"), &b, false));
    }
}
