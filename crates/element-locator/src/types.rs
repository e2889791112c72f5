//! Core types for locator system

use serde::{Deserialize, Serialize};
use soultrace_core_types::AccessibilityDescriptor;

/// Attributes consulted for the stable id, in priority order, with the prefix
/// each contributes.
pub const STABLE_ID_ATTRIBUTES: [(&str, &str); 8] = [
    ("data-testid", "test-"),
    ("aria-label", "aria-"),
    ("id", "id-"),
    ("name", "name-"),
    ("placeholder", "placeholder-"),
    ("alt", "alt-"),
    ("title", "title-"),
    ("role", "role-"),
];

/// Maximum number of segments in a CSS path.
pub const CSS_PATH_MAX_SEGMENTS: usize = 5;

/// Maximum number of role segments in an accessibility path.
pub const AX_PATH_MAX_SEGMENTS: usize = 5;

/// Characters of text content folded into the semantic hash.
pub const SEMANTIC_TEXT_CHARS: usize = 30;

/// Cap on the accessible name derived from text content.
pub const AX_NAME_MAX_CHARS: usize = 50;

/// Cap on names appended to accessibility path segments.
pub const AX_PATH_NAME_MAX_CHARS: usize = 25;

/// Which identifier a locator computation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    StableId,
    CssPath,
    XPath,
    Accessibility,
}

impl LocatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorKind::StableId => "stable-id",
            LocatorKind::CssPath => "css-path",
            LocatorKind::XPath => "xpath",
            LocatorKind::Accessibility => "accessibility",
        }
    }
}

/// How a stable id was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StableIdSource {
    /// First non-empty attribute from [`STABLE_ID_ATTRIBUTES`].
    Attribute(String),
    /// Semantic fallback hash over tag, classes, text and sibling index.
    Hashed,
}

/// Stable id together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableId {
    pub value: String,
    pub source: StableIdSource,
}

impl StableId {
    pub fn is_hashed(&self) -> bool {
        matches!(self.source, StableIdSource::Hashed)
    }
}

/// The four independent identifiers computed for one element.
///
/// Each field is best-effort: a failure leaves that field empty and never
/// affects the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementLocators {
    pub bid: String,
    pub css_path: String,
    pub xpath: String,
    pub accessibility: AccessibilityDescriptor,
}
