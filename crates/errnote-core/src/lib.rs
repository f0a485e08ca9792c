//! Structured error annotation: coded identities, cause chains, stack
//! snapshots, and deduplicated rendering.
//!
//! Call sites [`declare`] an identity once (registered process-wide, with
//! collision detection), wrap failures with [`because`] or [`annotate`]
//! to build a cause chain carrying diagnostic fields and a stack
//! snapshot, then inspect the chain with [`is`]/[`caused_by`]/[`data`] or
//! render it as a multi-line message or JSON.

pub mod batch;
mod bufpool;
pub mod error;
pub mod node;
pub mod registry;
pub mod render;
pub mod tracer;
pub mod underlying;

// Re-export commonly used items
pub use batch::{batch, unbatch, Batch};
pub use error::{caused_by, data, has_data, is, Error};
pub use node::{annotate, because, Node};
pub use registry::{declare, register_declare_filter, set_module_root};
pub use render::InfoItem;
pub use tracer::{TraceInfoItem, Tracer, MAX_STACK_DEPTH};
pub use underlying::Underlying;

// The field system is a collaborator crate; re-export it so call sites
// need a single dependency.
pub use errnote_fields as field;
pub use errnote_fields::Field;
