//! DOM snapshot model
//!
//! The capture pipeline never talks to a live browser. Hosts hand it a
//! [`DomDocument`]: an arena of nodes addressed by [`NodeId`] that carries just
//! what the locator, classifier and normalizer read (tags, attributes, text,
//! form values, click handlers, geometry).
//!
//! - [`DomDocument`]: arena plus tree navigation and mutation
//! - [`NodeSpec`]: nested JSON form used to load snapshots and insert subtrees
//! - [`select`]: minimal compound-selector lookup for hosts and transcripts

pub mod document;
pub mod errors;
pub mod node;
pub mod select;
pub mod spec;

pub use document::DomDocument;
pub use errors::DomError;
pub use node::{DomNode, NodeId, NodeKind};
pub use spec::NodeSpec;
