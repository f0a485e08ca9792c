//! Rendering a cause chain as info-items, text, and JSON.
//!
//! [`Node::info_stack`] unwinds a chain into one [`InfoItem`] per level,
//! deepest cause first, with each level's stack trace trimmed against the
//! next enclosing node's. The text form and the JSON form are both
//! projections of that sequence.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::bufpool;
use crate::error::Error;
use crate::node::Node;
use crate::tracer::TraceInfoItem;

/// One rendered level of a cause chain.
#[derive(Debug, Serialize)]
pub struct InfoItem {
    /// Text form of this level's identity (or opaque cause); null when the
    /// level carries neither.
    pub underlying: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(rename = "stackTrace", skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<TraceInfoItem>,
}

impl Node {
    /// Unwinds the cause chain into info-items, deepest cause first. Each
    /// level's trace is trimmed against `parent`'s tracer (the next
    /// enclosing node).
    ///
    /// An opaque cause under a node that carries its own identity becomes
    /// a separate leading item; under an identity-less node it becomes
    /// that node's identity line instead.
    pub fn info_stack(&self, parent: Option<&Node>) -> Vec<InfoItem> {
        let mut stack = Vec::new();
        let mut item = InfoItem {
            underlying: None,
            data: None,
            stack_trace: Vec::new(),
        };
        match self.cause() {
            Some(Error::Node(cause)) => {
                stack = cause.info_stack(Some(self));
            }
            Some(cause) => {
                if self.own_underlying().is_some() {
                    stack.push(InfoItem {
                        underlying: Some(cause.to_string()),
                        data: None,
                        stack_trace: Vec::new(),
                    });
                } else {
                    item.underlying = Some(cause.to_string());
                }
            }
            None => {}
        }
        if let Some(own) = self.own_underlying() {
            item.underlying = Some(own.to_string());
        }
        let data = self.data_map();
        if !data.is_empty() {
            item.data = Some(data);
        }
        item.stack_trace = self.tracer().info_stack(parent.map(|p| p.tracer()));
        stack.push(item);
        stack
    }

    /// The multi-line text form: per level `\n<code>: <message>`, the
    /// field set as JSON when non-empty, then indented trace frames.
    pub(crate) fn render_message(&self) -> String {
        let mut out = String::new();
        for item in self.info_stack(None) {
            if let Some(underlying) = &item.underlying {
                out.push('\n');
                out.push_str(underlying);
            }
            if let Some(data) = &item.data {
                out.push_str(": ");
                match serde_json::to_string(data) {
                    Ok(json) => out.push_str(&json),
                    Err(err) => out.push_str(&err.to_string()),
                }
            }
            for frame in &item.stack_trace {
                out.push_str("\n  ");
                out.push_str(&frame.func);
                out.push_str("\n    ");
                out.push_str(&frame.line);
            }
        }
        out
    }
}

// A node serializes as its info-item array, deepest cause first.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.info_stack(None).serialize(serializer)
    }
}

// Every variant serializes infallibly: opaque members render as their
// text form rather than failing the encode.
impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Error::Opaque(e) => serializer.collect_str(e),
            Error::Underlying(u) => u.serialize(serializer),
            Error::Node(n) => n.serialize(serializer),
            Error::Batch(b) => {
                let mut seq = serializer.serialize_seq(Some(b.errors().len()))?;
                for member in b.errors() {
                    seq.serialize_element(member)?;
                }
                seq.end()
            }
        }
    }
}

impl Error {
    /// JSON bytes of this error's rendered form, encoded through the
    /// shared buffer pool.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        encode_json(self)
    }
}

impl Node {
    /// JSON bytes of the info-item array, deepest cause first.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        encode_json(&self.info_stack(None))
    }
}

/// Encodes into pooled scratch, copying out only the final bytes.
fn encode_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = bufpool::get();
    let result = serde_json::to_writer(&mut buf, value).map(|()| buf.as_slice().to_vec());
    bufpool::put(buf);
    result
}
