//! Shared wire/domain types for the indexing bridge (§3 of the design).
//!
//! These are plain `serde`-derived structs, the same texture the teacher
//! uses throughout `crates/value` and `crates/convex/sync_types`: no
//! behavior beyond constructors and simple accessors lives here, so every
//! other crate can depend on `model` without pulling in HTTP or indexing
//! logic.

pub mod cursor;
pub mod encoding;
pub mod namespace;
pub mod node;
pub mod transaction;

pub use cursor::Cursor;
pub use namespace::NamespaceMapping;
pub use node::{
    AclReaders,
    Node,
    PropertyValue,
};
pub use transaction::{
    NodeStatus,
    Transaction,
    TransactionNode,
};
