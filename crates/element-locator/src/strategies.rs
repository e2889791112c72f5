//! Identifier strategies
//!
//! Four independent derivations, each a pure function of the snapshot:
//! 1. Stable id - attribute priority list, then semantic hash
//! 2. CSS path - nearest five segments, stopping at the first id
//! 3. XPath - absolute, with `@id` and `/html/body` shortcuts
//! 4. Accessibility - role, accessible name and role path

use soultrace_core_types::AccessibilityDescriptor;
use soultrace_dom_model::{DomDocument, DomNode, NodeId};

use crate::errors::LocatorError;
use crate::hash::{normalize, short_hash};
use crate::types::*;

fn element(doc: &DomDocument, node: NodeId) -> Result<&DomNode, LocatorError> {
    let raw = doc.node(node).ok_or(LocatorError::UnknownNode(node))?;
    if !raw.is_element() {
        return Err(LocatorError::NotAnElement(node));
    }
    Ok(raw)
}

/// Stable id for `node`.
///
/// Always non-empty for an element: when no attribute in
/// [`STABLE_ID_ATTRIBUTES`] yields a usable value the id falls back to
/// `tag[-classes]-hash`, where the hash covers tag, classes, the first
/// characters of text and the sibling index.
pub fn stable_id(doc: &DomDocument, node: NodeId) -> Result<StableId, LocatorError> {
    let el = element(doc, node)?;
    for (attr, prefix) in STABLE_ID_ATTRIBUTES {
        if let Some(value) = el.non_empty_attribute(attr) {
            let normalized = normalize(value);
            if normalized.is_empty() {
                continue;
            }
            return Ok(StableId {
                value: format!("{prefix}{normalized}"),
                source: StableIdSource::Attribute(attr.to_string()),
            });
        }
    }

    let classes = el.class_list();
    let text: String = doc
        .text_content(node)
        .trim()
        .chars()
        .take(SEMANTIC_TEXT_CHARS)
        .collect();
    let sibling_index = doc.element_index(node).unwrap_or(0);
    let semantic = format!(
        "{}|{}|{}|{}",
        el.tag,
        classes.join("."),
        text,
        sibling_index
    );
    let hash = short_hash(&semantic);
    let raw = if classes.is_empty() {
        format!("{}-{}", el.tag, hash)
    } else {
        format!("{}-{}-{}", el.tag, classes.join("-"), hash)
    };
    Ok(StableId {
        value: normalize(&raw),
        source: StableIdSource::Hashed,
    })
}

/// CSS path from the nearest ancestors down to `node`, capped at
/// [`CSS_PATH_MAX_SEGMENTS`] segments.
pub fn css_path(doc: &DomDocument, node: NodeId) -> Result<String, LocatorError> {
    element(doc, node)?;
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        if segments.len() >= CSS_PATH_MAX_SEGMENTS {
            break;
        }
        let Ok(el) = element(doc, id) else {
            break;
        };
        if let Some(el_id) = el.non_empty_attribute("id") {
            // ids are assumed unique, so nothing above them adds precision
            segments.push(format!("{}#{}", el.tag, css_ident(el_id.trim())));
            break;
        }
        let mut segment = el.tag.clone();
        for class in el.class_list() {
            segment.push('.');
            segment.push_str(&css_ident(class));
        }
        if let Some(position) = doc.same_tag_position(id) {
            if position > 1 {
                segment.push_str(&format!(":nth-of-type({position})"));
            }
        }
        segments.push(segment);
        current = doc.parent_element(id);
    }
    segments.reverse();
    Ok(segments.join(" > "))
}

/// Absolute XPath for `node`; detached nodes have no reliable path.
pub fn xpath(doc: &DomDocument, node: NodeId) -> Result<String, LocatorError> {
    element(doc, node)?;
    if !doc.is_connected(node) {
        return Err(LocatorError::Detached(node));
    }
    xpath_segment(doc, node)
}

fn xpath_segment(doc: &DomDocument, node: NodeId) -> Result<String, LocatorError> {
    let el = element(doc, node)?;
    if let Some(id) = el.non_empty_attribute("id") {
        return Ok(format!("//*[@id={}]", xpath_literal(id)));
    }
    if doc.body() == Some(node) {
        return Ok("/html/body".to_string());
    }
    if doc.document_element() == Some(node) {
        return Ok(format!("/{}", el.tag));
    }
    let parent = doc
        .parent_element(node)
        .ok_or(LocatorError::Detached(node))?;
    let position = doc
        .same_tag_position(node)
        .ok_or_else(|| LocatorError::Internal("node missing from parent".into()))?;
    let parent_path = xpath_segment(doc, parent)?;
    Ok(format!("{parent_path}/{}[{position}]", el.tag))
}

/// Escapes `value` for use as a CSS identifier after `#` or `.`.
fn css_ident(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            c if c.is_ascii_digit() && i == 0 => out.push_str(&format!("\\{:x} ", c as u32)),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:x} ", c as u32)),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Quotes `value` as an XPath string literal. XPath 1.0 has no escape
/// sequence, so values holding both quote kinds go through `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// Role implied by the tag when no explicit `role` attribute is present.
pub fn implicit_role(tag: &str) -> &'static str {
    match tag {
        "a" => "link",
        "button" => "button",
        "h1" | "h2" | "h3" => "heading",
        "input" => "textbox",
        "select" => "combobox",
        "textarea" => "textbox",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        _ => "",
    }
}

pub fn role_of(el: &DomNode) -> String {
    match el.non_empty_attribute("role") {
        Some(role) => role.trim().to_string(),
        None => implicit_role(&el.tag).to_string(),
    }
}

/// Accessible name: `aria-label`, `alt`, `title`, then trimmed text.
pub fn accessible_name(doc: &DomDocument, node: NodeId) -> String {
    let Some(el) = doc.element(node) else {
        return String::new();
    };
    for attr in ["aria-label", "alt", "title"] {
        if let Some(value) = el.non_empty_attribute(attr) {
            return value.trim().to_string();
        }
    }
    truncate_chars(doc.text_content(node).trim(), AX_NAME_MAX_CHARS)
}

pub fn accessibility(
    doc: &DomDocument,
    node: NodeId,
) -> Result<AccessibilityDescriptor, LocatorError> {
    let el = element(doc, node)?;
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        if segments.len() >= AX_PATH_MAX_SEGMENTS {
            break;
        }
        let Some(ancestor) = doc.element(id) else {
            break;
        };
        let role = role_of(ancestor);
        if !role.is_empty() {
            let name = accessible_name(doc, id);
            if name.is_empty() {
                segments.push(role);
            } else {
                segments.push(format!(
                    "{role}[{}]",
                    truncate_chars(&name, AX_PATH_NAME_MAX_CHARS)
                ));
            }
        }
        current = doc.parent_element(id);
    }
    segments.reverse();

    Ok(AccessibilityDescriptor {
        role: role_of(el),
        name: accessible_name(doc, node),
        path: segments.join(" > "),
        id: el.attribute("id").unwrap_or_default().to_string(),
        tag_name: el.tag.clone(),
    })
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use soultrace_dom_model::NodeSpec;

    fn page() -> DomDocument {
        DomDocument::from_json(
            r#"{"tag":"html","children":[
                {"tag":"head"},
                {"tag":"body","children":[
                    {"tag":"nav","attrs":{"role":"navigation","aria-label":"Primary"},"children":[
                        {"tag":"ul","children":[
                            {"tag":"li","children":[{"tag":"a","attrs":{"href":"/"},"text":"Home"}]},
                            {"tag":"li","children":[{"tag":"a","attrs":{"href":"/docs","class":"nav-link active"},"text":"Docs"}]}
                        ]}
                    ]},
                    {"tag":"main","attrs":{"id":"content"},"children":[
                        {"tag":"div","attrs":{"class":"card"},"text":"First card"},
                        {"tag":"div","attrs":{"class":"card"},"text":"Second card"}
                    ]}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn stable_id_prefers_attributes_in_order() {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        let ids = doc
            .insert_subtree(
                body,
                &NodeSpec::element("div")
                    .child(
                        NodeSpec::element("input")
                            .attr("data-testid", "Login Email")
                            .attr("id", "email"),
                    )
                    .child(NodeSpec::element("input").attr("id", "pw").attr("name", "password"))
                    .child(NodeSpec::element("input").attr("placeholder", "Search...")),
            )
            .unwrap();
        assert_eq!(stable_id(&doc, ids[1]).unwrap().value, "test-login-email");
        assert_eq!(stable_id(&doc, ids[2]).unwrap().value, "id-pw");
        let search = stable_id(&doc, ids[3]).unwrap();
        assert_eq!(search.value, "placeholder-search");
        assert_eq!(search.source, StableIdSource::Attribute("placeholder".into()));
    }

    #[test]
    fn stable_id_skips_values_that_normalize_to_nothing() {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        let id = doc
            .insert_subtree(
                body,
                &NodeSpec::element("button").attr("aria-label", "***").attr("name", "go"),
            )
            .unwrap()[0];
        assert_eq!(stable_id(&doc, id).unwrap().value, "name-go");
    }

    #[test]
    fn hashed_stable_id_has_tag_classes_and_hash() {
        let doc = page();
        let card = doc.select("div.card").unwrap().unwrap();
        let id = stable_id(&doc, card).unwrap();
        assert!(id.is_hashed());
        assert!(id.value.starts_with("div-card-"));
        assert_eq!(id.value.len(), "div-card-".len() + 6);
    }

    #[test]
    fn css_path_stops_at_id_and_adds_nth_of_type() {
        let doc = page();
        let cards = doc.select_all("div.card").unwrap();
        assert_eq!(css_path(&doc, cards[0]).unwrap(), "main#content > div.card");
        assert_eq!(
            css_path(&doc, cards[1]).unwrap(),
            "main#content > div.card:nth-of-type(2)"
        );
    }

    #[test]
    fn css_path_is_capped_at_five_segments() {
        let doc = page();
        let docs_link = doc.select("a.nav-link").unwrap().unwrap();
        let path = css_path(&doc, docs_link).unwrap();
        assert_eq!(
            path,
            "body > nav > ul > li:nth-of-type(2) > a.nav-link.active"
        );
    }

    #[test]
    fn xpath_uses_shortcuts_and_positions() {
        let doc = page();
        let cards = doc.select_all("div.card").unwrap();
        assert_eq!(xpath(&doc, cards[1]).unwrap(), "//*[@id=\"content\"]/div[2]");
        let home = doc.select("a[href=/]").unwrap().unwrap();
        assert_eq!(
            xpath(&doc, home).unwrap(),
            "/html/body/nav[1]/ul[1]/li[1]/a[1]"
        );
        assert_eq!(xpath(&doc, doc.body().unwrap()).unwrap(), "/html/body");
        assert_eq!(
            xpath(&doc, doc.document_element().unwrap()).unwrap(),
            "/html"
        );
    }

    #[test]
    fn ids_with_special_characters_are_escaped() {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        let quoted = doc
            .insert_subtree(body, &NodeSpec::element("div").attr("id", "say \"hi\""))
            .unwrap()[0];
        let mixed = doc
            .insert_subtree(body, &NodeSpec::element("div").attr("id", "it's \"x\""))
            .unwrap()[0];
        let numeric = doc
            .insert_subtree(body, &NodeSpec::element("span").attr("id", "1a:b"))
            .unwrap()[0];

        assert_eq!(xpath(&doc, quoted).unwrap(), r#"//*[@id='say "hi"']"#);
        assert_eq!(
            xpath(&doc, mixed).unwrap(),
            r#"//*[@id=concat("it's ", '"', "x", '"', "")]"#
        );
        assert_eq!(css_path(&doc, numeric).unwrap(), r"span#\31 a\:b");
        assert_eq!(css_path(&doc, quoted).unwrap(), r#"div#say\ \"hi\""#);
    }

    #[test]
    fn xpath_rejects_detached_nodes() {
        let mut doc = page();
        let card = doc.select("div.card").unwrap().unwrap();
        doc.detach(card);
        assert_eq!(xpath(&doc, card), Err(LocatorError::Detached(card)));
    }

    #[test]
    fn accessibility_descriptor_uses_implicit_roles() {
        let doc = page();
        let docs_link = doc.select("a.nav-link").unwrap().unwrap();
        let ax = accessibility(&doc, docs_link).unwrap();
        assert_eq!(ax.role, "link");
        assert_eq!(ax.name, "Docs");
        assert_eq!(ax.tag_name, "a");
        assert_eq!(
            ax.path,
            "navigation[Primary] > list[HomeDocs] > listitem[Docs] > link[Docs]"
        );
    }

    #[test]
    fn accessible_name_caps_text() {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        let long = "x".repeat(80);
        let id = doc
            .insert_subtree(body, &NodeSpec::element("h2").with_text(&format!("  {long}  ")))
            .unwrap()[0];
        let ax = accessibility(&doc, id).unwrap();
        assert_eq!(ax.role, "heading");
        assert_eq!(ax.name.len(), AX_NAME_MAX_CHARS);
        assert_eq!(ax.path, format!("heading[{}]", "x".repeat(AX_PATH_NAME_MAX_CHARS)));
    }
}
