//! Recorded event schema.
//!
//! These types are what a task persists and what the export artifact contains,
//! so field names are serialized in camelCase to keep the JSON stable.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::time::EpochMillis;

/// Enumerated kinds of recorded events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Click,
    #[serde(rename = "dblclick")]
    DoubleClick,
    #[serde(rename = "mousedown")]
    MouseDown,
    #[serde(rename = "mouseup")]
    MouseUp,
    #[serde(rename = "mouseover")]
    MouseOver,
    #[serde(rename = "mouseout")]
    MouseOut,
    #[serde(rename = "contextmenu")]
    ContextMenu,
    #[serde(rename = "keydown")]
    KeyDown,
    #[serde(rename = "keyup")]
    KeyUp,
    Input,
    Change,
    Submit,
    Focus,
    Blur,
    Scroll,
    Navigation,
    PageLoad,
    ElementAdded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::DoubleClick => "dblclick",
            EventType::MouseDown => "mousedown",
            EventType::MouseUp => "mouseup",
            EventType::MouseOver => "mouseover",
            EventType::MouseOut => "mouseout",
            EventType::ContextMenu => "contextmenu",
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
            EventType::Input => "input",
            EventType::Change => "change",
            EventType::Submit => "submit",
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::Scroll => "scroll",
            EventType::Navigation => "navigation",
            EventType::PageLoad => "page_load",
            EventType::ElementAdded => "element_added",
        }
    }

    /// Events that represent the end of a press, deduplicated as hardware double-fires.
    pub fn is_click_class(&self) -> bool {
        matches!(self, EventType::Click | EventType::MouseUp)
    }

    pub fn is_hover(&self) -> bool {
        matches!(self, EventType::MouseOver | EventType::MouseOut)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            EventType::Click
                | EventType::DoubleClick
                | EventType::MouseDown
                | EventType::MouseUp
                | EventType::MouseOver
                | EventType::MouseOut
                | EventType::ContextMenu
        )
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, EventType::KeyDown | EventType::KeyUp)
    }

    /// Events the recorder fabricates itself rather than receiving from the page.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            EventType::Navigation | EventType::PageLoad | EventType::ElementAdded
        )
    }

    /// Events that only make sense with an element target.
    pub fn requires_target(&self) -> bool {
        !matches!(self, EventType::Navigation | EventType::PageLoad)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Modifier keys held while a pointer or keyboard event fired.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct KeyMod: u8 {
        const CTRL = 0b0001;
        const SHIFT = 0b0010;
        const ALT = 0b0100;
        const META = 0b1000;
    }
}

impl Default for KeyMod {
    fn default() -> Self {
        KeyMod::empty()
    }
}

/// Axis-aligned element geometry in viewport pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Accessibility view of an element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityDescriptor {
    pub role: String,
    pub name: String,
    pub path: String,
    pub id: String,
    pub tag_name: String,
}

impl AccessibilityDescriptor {
    pub fn is_empty(&self) -> bool {
        self.role.is_empty() && self.name.is_empty() && self.tag_name.is_empty()
    }
}

/// Everything recorded about the element an event targeted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub is_interactive: bool,
    pub xpath: String,
    pub css_path: String,
    pub bid: String,
    pub accessibility: AccessibilityDescriptor,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<u32>,
    #[serde(default)]
    pub modifiers: KeyMod,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardDetails {
    pub key: String,
    pub code: String,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub modifiers: KeyMod,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollDetails {
    pub delta_x: f64,
    pub delta_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDetails {
    pub from_url: String,
    pub to_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub referrer: String,
    /// Whether the transition followed click activity on the previous page.
    #[serde(default)]
    pub after_click: bool,
    /// True when the transition replaced the document rather than rewriting history.
    #[serde(default)]
    pub cross_document: bool,
}

/// One normalized, persisted occurrence belonging to a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Assigned once when the event is recorded; the store deduplicates on it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: EpochMillis,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<PointerDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<KeyboardDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationDetails>,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl EventRecord {
    pub fn new(event_type: EventType, timestamp: EpochMillis, url: impl Into<String>) -> Self {
        Self {
            event_id: String::new(),
            event_type,
            timestamp,
            url: url.into(),
            correlation_id: None,
            target: None,
            pointer: None,
            keyboard: None,
            scroll: None,
            navigation: None,
            screenshot: None,
        }
    }

    pub fn with_event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = id.into();
        self
    }

    pub fn with_target(mut self, target: TargetDescriptor) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationDetails) -> Self {
        self.navigation = Some(navigation);
        self
    }

    pub fn bid(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.bid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_names_match_dom_names() {
        for ty in [
            EventType::DoubleClick,
            EventType::MouseDown,
            EventType::ContextMenu,
            EventType::KeyUp,
            EventType::PageLoad,
            EventType::ElementAdded,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn record_serializes_type_and_null_screenshot() {
        let record = EventRecord::new(EventType::Click, 42, "https://a/");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "click");
        assert!(value["screenshot"].is_null());
        assert!(value.get("target").is_none());
    }

    #[test]
    fn target_uses_camel_case_fields() {
        let target = TargetDescriptor {
            tag_name: "button".into(),
            is_interactive: true,
            bid: "id-submit".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value["tagName"], "button");
        assert_eq!(value["isInteractive"], true);
        assert_eq!(value["bid"], "id-submit");
    }

    #[test]
    fn click_class_covers_click_and_mouseup_only() {
        assert!(EventType::Click.is_click_class());
        assert!(EventType::MouseUp.is_click_class());
        assert!(!EventType::MouseDown.is_click_class());
        assert!(!EventType::DoubleClick.is_click_class());
    }
}
