//! Occurrence to [`EventRecord`] conversion.

use element_locator::{is_interactive, locate};
use soultrace_core_types::{EpochMillis, EventRecord, TargetDescriptor};
use soultrace_dom_model::{DomDocument, NodeId};

use crate::errors::CaptureError;
use crate::filter::current_value;
use crate::model::Occurrence;

/// Characters of text content kept on a target descriptor.
pub const TARGET_TEXT_MAX_CHARS: usize = 100;

/// Page-level facts the normalizer stamps onto every record.
#[derive(Clone, Copy, Debug)]
pub struct NormalizeContext<'a> {
    pub url: &'a str,
    /// Timestamp of the newest record already in the buffer.
    pub last_timestamp: Option<EpochMillis>,
}

/// Builds the canonical record for `occ`. Fails when the target is a
/// detached element, or when the occurrence needs a target and has no live
/// element for one; callers drop the occurrence in that case.
pub fn normalize(
    doc: &DomDocument,
    occ: &Occurrence,
    ctx: NormalizeContext<'_>,
) -> Result<EventRecord, CaptureError> {
    let timestamp = ctx
        .last_timestamp
        .map_or(occ.timestamp, |last| occ.timestamp.max(last));
    let mut record = EventRecord::new(occ.kind, timestamp, ctx.url);

    match occ.target {
        Some(target) if doc.is_element(target) && !doc.is_connected(target) => {
            return Err(CaptureError::DetachedTarget(target));
        }
        Some(target) if doc.is_element(target) => {
            record.target = Some(describe_target(doc, target, occ));
        }
        Some(target) if occ.kind.requires_target() => {
            return Err(CaptureError::InvalidTarget(target));
        }
        None if occ.kind.requires_target() => return Err(CaptureError::MissingTarget),
        _ => {}
    }

    if occ.kind.is_pointer() {
        record.pointer = occ.pointer.clone();
    }
    if occ.kind.is_keyboard() {
        record.keyboard = occ.keyboard.clone();
    }
    record.scroll = occ.scroll.clone();
    Ok(record)
}

/// Target metadata; the locator fields degrade independently.
pub fn describe_target(doc: &DomDocument, node: NodeId, occ: &Occurrence) -> TargetDescriptor {
    let Some(el) = doc.element(node) else {
        return TargetDescriptor::default();
    };
    let locators = locate(doc, node);
    let text: String = doc
        .text_content(node)
        .trim()
        .chars()
        .take(TARGET_TEXT_MAX_CHARS)
        .collect();
    TargetDescriptor {
        tag_name: el.tag.to_ascii_lowercase(),
        id: el.attribute("id").unwrap_or_default().to_string(),
        class_name: el.attribute("class").unwrap_or_default().to_string(),
        text,
        value: current_value(doc, occ),
        is_interactive: is_interactive(doc, node),
        xpath: locators.xpath,
        css_path: locators.css_path,
        bid: locators.bid,
        accessibility: locators.accessibility,
        attributes: el.attributes.clone(),
        bounding_box: el.rect.filter(|rect| rect.is_finite()),
    }
}
