//! Cause nodes: the causal wrapper around an error.
//!
//! A [`Node`] combines an optional identity, an optional wrapped cause
//! (another node or any opaque error), an ordered field set, and the stack
//! snapshot captured at construction. Identity and cause are fixed at
//! construction (except the one documented pre-publish rebind in
//! [`Node::with_cause`]); fields may keep being appended after the node
//! has been shared across threads, guarded by a per-node read/write lock.

use std::sync::{Arc, RwLock};

use errnote_fields::Field;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::tracer::Tracer;
use crate::underlying::Underlying;

/// A causal wrapper around an error. See the module docs.
#[derive(Debug)]
pub struct Node {
    tracer: Tracer,
    data: RwLock<Vec<Field>>,
    /// Always the `Underlying` variant when present.
    underlying: Option<Error>,
    cause: Option<Box<Error>>,
}

/// Wraps an existing error as a cause, annotated with `fields`.
///
/// A `None` cause yields `None`, so annotation chains compose without a
/// check at every call site. When the cause is already a [`Node`] the
/// fields fold into it instead of wrapping; the stack trace stays
/// attributed to the node's original construction site.
pub fn annotate(
    cause: impl Into<Option<Error>>,
    fields: impl IntoIterator<Item = Field>,
) -> Option<Error> {
    let cause = cause.into()?;
    if let Error::Node(node) = cause {
        node.with_data(fields);
        return Some(Error::Node(node));
    }
    let node = Node::new(None, Some(cause), Tracer::capture(1));
    node.with_data(fields);
    Some(Error::Node(Box::new(node)))
}

/// Wraps `cause` under an explicit identity describing *why*, annotated
/// with `fields`. A `None` cause yields `None`.
pub fn because(
    underlying: Arc<Underlying>,
    cause: impl Into<Option<Error>>,
    fields: impl IntoIterator<Item = Field>,
) -> Option<Error> {
    let cause = cause.into()?;
    let node = Node::new(Some(underlying), Some(cause), Tracer::capture(1));
    node.with_data(fields);
    Some(Error::Node(Box::new(node)))
}

impl Node {
    pub(crate) fn new(
        underlying: Option<Arc<Underlying>>,
        cause: Option<Error>,
        tracer: Tracer,
    ) -> Node {
        Node {
            tracer,
            data: RwLock::new(Vec::new()),
            underlying: underlying.map(Error::Underlying),
            cause: cause.map(Box::new),
        }
    }

    /// Appends fields under the write lock. Safe to call on a node that is
    /// concurrently read or rendered by other threads.
    pub fn with_data(&self, fields: impl IntoIterator<Item = Field>) -> &Self {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.extend(fields);
        drop(data);
        self
    }

    /// Rebinds the cause. Consuming `self` restricts this to the
    /// single-owner window before the node is published; a shared node's
    /// cause can never change.
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The node's own identity, ignoring the cause.
    pub(crate) fn own_underlying(&self) -> Option<&Error> {
        self.underlying.as_ref()
    }

    /// Looks up a field value. When `recursive`, the wrapped cause's value
    /// is resolved *before* the local set: an ancestor's field shadows a
    /// local one of the same key. Locally, the first appended match wins.
    pub fn data(&self, key: &str, recursive: bool) -> Option<Value> {
        if recursive {
            if let Some(Error::Node(cause)) = self.cause.as_deref() {
                if let Some(value) = cause.data(key, recursive) {
                    return Some(value);
                }
            }
        }
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.iter()
            .find(|f| f.key() == key)
            .map(|f| f.value().clone())
    }

    /// Whether a field with `key` exists; same search order as
    /// [`Node::data`].
    pub fn has_data(&self, key: &str, recursive: bool) -> bool {
        if recursive {
            if let Some(Error::Node(cause)) = self.cause.as_deref() {
                if cause.has_data(key, recursive) {
                    return true;
                }
            }
        }
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.iter().any(|f| f.key() == key)
    }

    /// All local fields folded into one JSON object; a later field under
    /// the same key overwrites the earlier one.
    pub fn data_map(&self) -> Map<String, Value> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let mut map = Map::new();
        for field in data.iter() {
            field.add_to(&mut map);
        }
        map
    }

    /// Resolved machine code: the wrapped cause's when non-empty, else the
    /// node's own identity's, else empty. A node without its own identity
    /// transparently exposes its cause's.
    pub fn code(&self) -> &str {
        if let Some(cause) = self.cause.as_deref() {
            let code = cause.code();
            if !code.is_empty() {
                return code;
            }
        }
        if let Some(own) = &self.underlying {
            let code = own.code();
            if !code.is_empty() {
                return code;
            }
        }
        ""
    }

    /// Resolved human message; same precedence as [`Node::code`].
    pub fn message(&self) -> &str {
        if let Some(cause) = self.cause.as_deref() {
            let message = cause.message();
            if !message.is_empty() {
                return message;
            }
        }
        if let Some(own) = &self.underlying {
            let message = own.message();
            if !message.is_empty() {
                return message;
            }
        }
        ""
    }

    /// The node's effective identity: its own when present, else the
    /// wrapped cause when that cause is not itself a node.
    pub fn underlying(&self) -> Option<&Error> {
        if self.underlying.is_some() {
            return self.underlying.as_ref();
        }
        match self.cause.as_deref() {
            Some(Error::Node(_)) | None => None,
            Some(other) => Some(other),
        }
    }

    /// Identity comparison through the effective identities of both sides.
    pub fn is(&self, target: &Error) -> bool {
        let Some(mine) = self.underlying() else {
            return false;
        };
        match target {
            Error::Node(n) => match n.underlying() {
                Some(theirs) => mine.is(theirs),
                None => false,
            },
            _ => mine.is(target),
        }
    }

    /// Walks the cause chain for a match against `target`, returning the
    /// node where the match was found so its context can be extracted.
    ///
    /// With `deep_first` false the outermost match wins: own identity,
    /// then the immediate cause, then recursion. With `deep_first` true
    /// the innermost match wins: recursion first, the node's own identity
    /// last.
    pub fn caused_by(&self, target: &Error, deep_first: bool) -> Option<&Node> {
        if !deep_first && self.matches(target) {
            return Some(self);
        }
        if let Some(cause) = self.cause.as_deref() {
            if !deep_first && cause.is(target) {
                return Some(self);
            }
            if let Error::Node(n) = cause {
                if let Some(found) = n.caused_by(target, deep_first) {
                    return Some(found);
                }
            } else if deep_first && cause.is(target) {
                return Some(self);
            }
        }
        if deep_first && self.matches(target) {
            return Some(self);
        }
        None
    }

    /// Whether the node's own identity (not the effective one) matches.
    fn matches(&self, target: &Error) -> bool {
        self.underlying
            .as_ref()
            .map_or(false, |own| own.is(target))
    }
}
