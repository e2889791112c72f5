//! Noise suppression ahead of normalization.
//!
//! [`should_ignore`] is stateful on purpose: checking an occurrence also
//! records it in the [`FilterState`] memo, so callers must evaluate each
//! occurrence exactly once.

use std::collections::HashMap;

use serde::Serialize;

use element_locator::is_interactive;
use soultrace_core_types::{EpochMillis, EventType};
use soultrace_dom_model::{DomDocument, NodeId};

use crate::model::Occurrence;
use crate::policy::FilterThresholds;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    DuplicateClick,
    UnchangedInput,
    SmallScroll,
    HoverNoise,
    Debounced,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::DuplicateClick => "duplicate_click",
            DropReason::UnchangedInput => "unchanged_input",
            DropReason::SmallScroll => "small_scroll",
            DropReason::HoverNoise => "hover_noise",
            DropReason::Debounced => "debounced",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct LastKept {
    kind: EventType,
    target: Option<NodeId>,
    timestamp: EpochMillis,
}

/// Per-session memo consulted and updated by the filter.
#[derive(Clone, Debug, Default)]
pub struct FilterState {
    last_kept: Option<LastKept>,
    last_click: HashMap<(EventType, NodeId), EpochMillis>,
    last_input: HashMap<NodeId, String>,
    click_burst: u32,
}

impl FilterState {
    /// Clicks kept since the last navigation.
    pub fn click_burst(&self) -> u32 {
        self.click_burst
    }

    pub fn reset_click_burst(&mut self) {
        self.click_burst = 0;
    }

    pub fn last_input_value(&self, target: NodeId) -> Option<&str> {
        self.last_input.get(&target).map(String::as_str)
    }

    /// Seeds the unchanged-input memo, e.g. from a restored buffer.
    pub fn remember_input(&mut self, target: NodeId, value: impl Into<String>) {
        self.last_input.insert(target, value.into());
    }

    fn keep(&mut self, occ: &Occurrence, doc: &DomDocument) {
        if occ.kind.is_click_class() {
            self.click_burst += 1;
        }
        if occ.kind == EventType::Input {
            if let (Some(target), Some(value)) = (occ.target, current_value(doc, occ)) {
                self.last_input.insert(target, value);
            }
        }
        self.last_kept = Some(LastKept {
            kind: occ.kind,
            target: occ.target,
            timestamp: occ.timestamp,
        });
    }
}

/// Value an `input` occurrence carries, falling back to the node's value.
pub fn current_value(doc: &DomDocument, occ: &Occurrence) -> Option<String> {
    occ.value.clone().or_else(|| {
        occ.target
            .and_then(|target| doc.node(target))
            .and_then(|node| node.value.clone())
    })
}

/// Returns why `occ` should be dropped, or `None` to keep it. Rules run in
/// order and the first match wins.
pub fn should_ignore(
    state: &mut FilterState,
    thresholds: &FilterThresholds,
    doc: &DomDocument,
    occ: &Occurrence,
) -> Option<DropReason> {
    let interactive = occ.target.map_or(false, |t| is_interactive(doc, t));

    if occ.kind.is_click_class() {
        if let Some(target) = occ.target {
            let previous = state.last_click.insert((occ.kind, target), occ.timestamp);
            if interactive {
                state.keep(occ, doc);
                return None;
            }
            if let Some(previous) = previous {
                if occ.timestamp.saturating_sub(previous) < thresholds.duplicate_click_ms {
                    return Some(DropReason::DuplicateClick);
                }
            }
        }
    }

    if occ.kind == EventType::Input {
        if let (Some(target), Some(value)) = (occ.target, current_value(doc, occ)) {
            if state.last_input_value(target) == Some(value.as_str()) {
                return Some(DropReason::UnchangedInput);
            }
        }
    }

    if occ.kind == EventType::Scroll && occ.scroll_magnitude() < thresholds.scroll_min_delta {
        return Some(DropReason::SmallScroll);
    }

    if occ.kind.is_hover() && !interactive {
        let has_title = occ
            .target
            .and_then(|t| doc.attribute(t, "title"))
            .is_some();
        if !has_title {
            return Some(DropReason::HoverNoise);
        }
    }

    if let Some(last) = &state.last_kept {
        if last.kind == occ.kind
            && last.target == occ.target
            && occ.timestamp.saturating_sub(last.timestamp) < thresholds.debounce_ms
        {
            return Some(DropReason::Debounced);
        }
    }

    state.keep(occ, doc);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use soultrace_dom_model::NodeSpec;

    struct Page {
        doc: DomDocument,
        button: NodeId,
        div: NodeId,
        field: NodeId,
        titled: NodeId,
    }

    fn page() -> Page {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        let ids = doc
            .insert_subtree(
                body,
                &NodeSpec::element("main")
                    .child(NodeSpec::element("button").with_text("Go"))
                    .child(NodeSpec::element("div").attr("class", "card"))
                    .child(NodeSpec::element("input").attr("name", "q"))
                    .child(NodeSpec::element("span").attr("title", "Help")),
            )
            .unwrap();
        Page {
            doc,
            button: ids[1],
            div: ids[2],
            field: ids[3],
            titled: ids[4],
        }
    }

    fn run(state: &mut FilterState, page: &Page, occ: &Occurrence) -> Option<DropReason> {
        should_ignore(state, &FilterThresholds::default(), &page.doc, occ)
    }

    #[test]
    fn rapid_duplicate_click_on_plain_element_is_dropped() {
        let page = page();
        let mut state = FilterState::default();
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.div, 1_000)), None);
        assert_eq!(
            run(&mut state, &page, &Occurrence::click(page.div, 1_010)),
            Some(DropReason::DuplicateClick)
        );
        assert_eq!(state.click_burst(), 1);
    }

    #[test]
    fn interactive_clicks_bypass_every_rule() {
        let page = page();
        let mut state = FilterState::default();
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.button, 1_000)), None);
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.button, 1_005)), None);
        assert_eq!(state.click_burst(), 2);
    }

    #[test]
    fn mouseup_and_click_pair_is_kept() {
        let page = page();
        let mut state = FilterState::default();
        let up = Occurrence::on(EventType::MouseUp, page.div, 1_000);
        assert_eq!(run(&mut state, &page, &up), None);
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.div, 1_000)), None);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let page = page();
        let mut state = FilterState::default();
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.div, i64::MIN)), None);
        assert_eq!(run(&mut state, &page, &Occurrence::click(page.div, i64::MAX)), None);
        let hover = Occurrence::on(EventType::Focus, page.div, i64::MIN);
        assert_eq!(run(&mut state, &page, &hover), None);
    }

    #[test]
    fn unchanged_input_is_dropped() {
        let page = page();
        let mut state = FilterState::default();
        assert_eq!(run(&mut state, &page, &Occurrence::input(page.field, "rust", 0)), None);
        assert_eq!(
            run(&mut state, &page, &Occurrence::input(page.field, "rust", 900)),
            Some(DropReason::UnchangedInput)
        );
        assert_eq!(run(&mut state, &page, &Occurrence::input(page.field, "rusty", 1_800)), None);
    }

    #[test]
    fn small_scrolls_are_dropped() {
        let page = page();
        let body = page.doc.body().unwrap();
        let mut state = FilterState::default();
        for n in 0..10 {
            assert_eq!(
                run(&mut state, &page, &Occurrence::scroll(body, 0.0, 5.0, n * 40)),
                Some(DropReason::SmallScroll)
            );
        }
        assert_eq!(run(&mut state, &page, &Occurrence::scroll(body, 0.0, -120.0, 1_000)), None);
    }

    #[test]
    fn hover_needs_interactivity_or_title() {
        let page = page();
        let mut state = FilterState::default();
        let over = |target, at| Occurrence::on(EventType::MouseOver, target, at);
        assert_eq!(
            run(&mut state, &page, &over(page.div, 0)),
            Some(DropReason::HoverNoise)
        );
        assert_eq!(run(&mut state, &page, &over(page.titled, 500)), None);
        assert_eq!(run(&mut state, &page, &over(page.button, 1_000)), None);
    }

    #[test]
    fn same_type_and_target_within_window_is_debounced() {
        let page = page();
        let mut state = FilterState::default();
        let key = |at| Occurrence::key(EventType::KeyDown, page.field, "a", at);
        assert_eq!(run(&mut state, &page, &key(0)), None);
        assert_eq!(run(&mut state, &page, &key(120)), Some(DropReason::Debounced));
        assert_eq!(run(&mut state, &page, &key(400)), None);
    }
}
