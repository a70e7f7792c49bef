//! XML and JSON response document parsers, per spec section 4.6/4.7.
//!
//! Each submodule owns one document shape; all of them go through `quick-xml`'s
//! serde integration rather than hand-rolled string scanning, following the teacher
//! pack's ecosystem-first idiom.

pub mod acl;
pub mod block_list;
pub mod enumeration;
pub mod error;
pub mod messages;
pub mod properties;
