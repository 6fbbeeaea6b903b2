// Visual annotation of scan results.
//
// Every render starts by unwinding the previous one, so the live set of
// markers is always exactly what the last render produced.

use crate::dom::{Document, ListenerId, NodeId, is_void_element};
use crate::result::{ScanResult, Severity};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Marks nodes created by the annotator; the scanner ignores these subtrees
pub const INJECTED_ATTR: &str = "data-snare-injected";

pub const HIGHLIGHT_CLASS: &str = "snare-highlight";
pub const PULSE_CLASS: &str = "snare-pulse";
pub const TOOLTIP_CLASS: &str = "snare-tooltip";
pub const BADGE_CLASS: &str = "snare-badge";

/// How long a clicked annotation stays pulsing
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(3);

const STYLESHEET: &str = "\
.snare-highlight{position:relative;outline:2px solid #e53935;outline-offset:1px}\
.snare-highlight--default{background:rgba(229,57,53,.12)}\
.snare-highlight--warning{outline-color:#fb8c00;background:rgba(251,140,0,.15)}\
.snare-highlight--info{outline-color:#1e88e5;background:rgba(30,136,229,.12)}\
.snare-pulse{box-shadow:0 0 0 4px rgba(255,235,59,.9)}\
.snare-tooltip{display:none;position:absolute;z-index:2147483647;font:12px sans-serif;\
background:#212121;color:#fff;padding:4px 6px;border-radius:3px;white-space:pre}\
.snare-highlight:hover>.snare-tooltip{display:block}\
.snare-badge{position:absolute;top:-8px;right:-8px;min-width:16px;font:bold 10px sans-serif;\
background:#e53935;color:#fff;border-radius:8px;text-align:center}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorState {
    Idle,
    Rendering,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub annotated: usize,
    pub skipped: usize,
}

/// Markers placed on one node during one annotation cycle
#[derive(Debug, Clone)]
pub struct Annotation {
    pub node: NodeId,
    /// Ids of the results this annotation shows; results are not owned here
    pub result_ids: Vec<String>,
    pub badge: usize,
    pub severity: Severity,
    pub applied_classes: Vec<String>,
    original_class: Option<String>,
    injected: Vec<NodeId>,
    listener: ListenerId,
}

impl Annotation {
    pub fn injected(&self) -> &[NodeId] {
        &self.injected
    }
}

#[derive(Debug, Default)]
struct HighlightState {
    generation: u64,
    node: Option<NodeId>,
}

type SharedHighlight = Arc<Mutex<HighlightState>>;

pub struct Annotator {
    enabled: bool,
    state: AnnotatorState,
    annotations: Vec<Annotation>,
    stylesheet: Option<NodeId>,
    highlight: SharedHighlight,
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            enabled: true,
            state: AnnotatorState::Idle,
            annotations: Vec::new(),
            stylesheet: None,
            highlight: Arc::new(Mutex::new(HighlightState::default())),
        }
    }

    pub fn state(&self) -> AnnotatorState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn annotation off and tear down whatever is currently shown
    pub fn disable(&mut self, doc: &mut Document) {
        self.enabled = false;
        self.clear(doc);
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Node currently pulsing from a click, if any
    pub fn highlighted(&self) -> Option<NodeId> {
        lock(&self.highlight).node
    }

    /// Replace the current markers with markers for `results`.
    ///
    /// Network results have no node and are ignored. Results whose node is
    /// gone from the tree are skipped with a warning.
    pub fn render(&mut self, doc: &mut Document, results: &[ScanResult]) -> RenderSummary {
        self.clear(doc);

        let mut summary = RenderSummary::default();
        if !self.enabled || results.is_empty() {
            return summary;
        }

        self.state = AnnotatorState::Rendering;

        for (node, group) in group_by_node(results) {
            if !doc.is_attached(node) || !doc.is_element(node) {
                warn!("Skipping annotation for node {}: no longer in the document", node);
                summary.skipped += group.len();
                continue;
            }

            self.ensure_stylesheet(doc);
            let badge = self.annotations.len() + 1;
            match self.annotate(doc, node, &group, badge) {
                Ok(annotation) => {
                    self.annotations.push(annotation);
                    summary.annotated += 1;
                }
                Err(e) => {
                    warn!("Failed to annotate node {}: {}", node, e);
                    summary.skipped += group.len();
                }
            }
        }

        self.state = AnnotatorState::Idle;
        info!(
            "Rendered {} annotations ({} results skipped)",
            summary.annotated, summary.skipped
        );
        summary
    }

    /// Remove every marker, class and handler placed by the last render
    pub fn clear(&mut self, doc: &mut Document) {
        {
            let mut highlight = lock(&self.highlight);
            highlight.generation += 1;
            highlight.node = None;
        }

        for annotation in self.annotations.drain(..) {
            doc.remove_listener(annotation.listener);

            for injected in &annotation.injected {
                if doc.exists(*injected)
                    && let Err(e) = doc.remove(*injected)
                {
                    debug!("Could not remove marker {}: {}", injected, e);
                }
            }

            if doc.exists(annotation.node) {
                let restored = match &annotation.original_class {
                    Some(class) => doc.set_attr(annotation.node, "class", class),
                    None => doc.remove_attr(annotation.node, "class"),
                };
                if let Err(e) = restored {
                    debug!("Could not restore classes on {}: {}", annotation.node, e);
                }
            }
        }

        if let Some(sheet) = self.stylesheet.take()
            && doc.exists(sheet)
            && let Err(e) = doc.remove(sheet)
        {
            debug!("Could not remove stylesheet: {}", e);
        }

        self.state = AnnotatorState::Idle;
    }

    fn annotate(
        &self,
        doc: &mut Document,
        node: NodeId,
        group: &[&ScanResult],
        badge: usize,
    ) -> Result<Annotation, crate::error::DomError> {
        let severity = group
            .iter()
            .map(|r| r.kind.severity())
            .max()
            .unwrap_or(Severity::Default);

        let original_class = doc.attr(node, "class").map(String::from);
        let existing = doc.class_list(node);
        let mut applied_classes = Vec::new();
        for class in [HIGHLIGHT_CLASS, severity.css_class()] {
            if !existing.iter().any(|c| c == class) {
                doc.add_class(node, class)?;
                applied_classes.push(class.to_string());
            }
        }

        let injected = match marker_placement(doc, node) {
            Placement::Inside => {
                let (tooltip, badge_node) = create_markers(doc, group, badge)?;
                doc.append_child(node, tooltip)?;
                doc.append_child(node, badge_node)?;
                vec![tooltip, badge_node]
            }
            Placement::After(anchor) => {
                let (tooltip, badge_node) = create_markers(doc, group, badge)?;
                doc.insert_after(anchor, badge_node)?;
                doc.insert_after(anchor, tooltip)?;
                vec![tooltip, badge_node]
            }
            Placement::Omitted => {
                debug!("Node {} is outside the page body, classes only", node);
                Vec::new()
            }
        };

        let listener = doc.add_listener(node, click_handler(self.highlight.clone(), group));

        Ok(Annotation {
            node,
            result_ids: group.iter().map(|r| r.id.clone()).collect(),
            badge,
            severity,
            applied_classes,
            original_class,
            injected,
            listener,
        })
    }

    fn ensure_stylesheet(&mut self, doc: &mut Document) {
        if self.stylesheet.is_some() {
            return;
        }

        let container = doc
            .head()
            .or_else(|| doc.element_children(doc.root()).first().copied())
            .unwrap_or_else(|| doc.root());

        let sheet = doc.create_element("style");
        let text = doc.create_text(STYLESHEET);
        let attached = doc
            .set_attr(sheet, INJECTED_ATTR, "stylesheet")
            .and_then(|_| doc.append_child(sheet, text))
            .and_then(|_| doc.append_child(container, sheet));

        match attached {
            Ok(()) => self.stylesheet = Some(sheet),
            Err(e) => warn!("Could not inject stylesheet: {}", e),
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(highlight: &SharedHighlight) -> std::sync::MutexGuard<'_, HighlightState> {
    highlight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Elements whose content is never parsed as markup: raw text, escapable
/// raw text, option containers and replaced content
const OPAQUE_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "select", "option", "optgroup", "datalist", "iframe",
    "noscript", "template", "object", "video", "audio", "canvas",
];

fn holds_markup(tag: &str) -> bool {
    !is_void_element(tag) && !OPAQUE_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Appended as the node's last children
    Inside,
    /// Inserted as next siblings of the outermost element that cannot hold them
    After(NodeId),
    /// The node lives in `<head>`; only classes are applied
    Omitted,
}

fn marker_placement(doc: &Document, node: NodeId) -> Placement {
    let mut anchor = None;
    let mut current = Some(node);
    while let Some(el) = current {
        match doc.tag(el) {
            Some("head") => return Placement::Omitted,
            Some(tag) if !holds_markup(tag) => anchor = Some(el),
            _ => {}
        }
        current = doc.parent(el);
    }

    match anchor {
        Some(anchor) => Placement::After(anchor),
        None => Placement::Inside,
    }
}

/// Results grouped per source node, in order of first appearance
fn group_by_node(results: &[ScanResult]) -> Vec<(NodeId, Vec<&ScanResult>)> {
    let mut groups: Vec<(NodeId, Vec<&ScanResult>)> = Vec::new();
    for result in results {
        let Some(node) = result.source() else {
            continue;
        };
        match groups.iter_mut().find(|(n, _)| *n == node) {
            Some((_, group)) => group.push(result),
            None => groups.push((node, vec![result])),
        }
    }
    groups
}

/// Detached tooltip and badge elements for one annotation
fn create_markers(
    doc: &mut Document,
    group: &[&ScanResult],
    badge: usize,
) -> Result<(NodeId, NodeId), crate::error::DomError> {
    let tooltip = doc.create_element("span");
    doc.set_attr(tooltip, INJECTED_ATTR, "tooltip")?;
    doc.set_attr(tooltip, "class", TOOLTIP_CLASS)?;
    let tooltip_text = doc.create_text(&tooltip_text(group));
    doc.append_child(tooltip, tooltip_text)?;

    let badge_node = doc.create_element("span");
    doc.set_attr(badge_node, INJECTED_ATTR, "badge")?;
    doc.set_attr(badge_node, "class", BADGE_CLASS)?;
    let badge_text = doc.create_text(&badge.to_string());
    doc.append_child(badge_node, badge_text)?;

    Ok((tooltip, badge_node))
}

fn tooltip_text(group: &[&ScanResult]) -> String {
    group
        .iter()
        .map(|r| {
            format!(
                "Keyword: {} | Type: {} | Location: {}",
                r.keyword,
                r.kind.display_name(),
                r.where_label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn click_handler(
    highlight: SharedHighlight,
    group: &[&ScanResult],
) -> crate::dom::ClickHandler {
    let details: Vec<(String, &'static str, String)> = group
        .iter()
        .map(|r| (r.keyword.clone(), r.kind.as_str(), r.content.clone()))
        .collect();

    Arc::new(move |doc: &mut Document, node: NodeId| {
        for (keyword, kind, content) in &details {
            info!(%node, keyword = %keyword, kind = %kind, "Annotation clicked: {}", content);
        }
        start_highlight(doc, node, &highlight);
        true
    })
}

/// Pulse `node` and scroll to it. Any previous pulse ends immediately; the
/// new one clears itself after [`HIGHLIGHT_DURATION`].
fn start_highlight(doc: &mut Document, node: NodeId, highlight: &SharedHighlight) {
    let generation = {
        let mut state = lock(highlight);
        if let Some(previous) = state.node.take()
            && previous != node
            && doc.exists(previous)
        {
            let _ = doc.remove_class(previous, PULSE_CLASS);
        }
        state.generation += 1;
        state.node = Some(node);
        state.generation
    };

    if let Err(e) = doc.add_class(node, PULSE_CLASS) {
        debug!("Could not highlight {}: {}", node, e);
    }
    doc.scroll_into_view(node);

    let highlight = highlight.clone();
    doc.set_timeout(HIGHLIGHT_DURATION, move |doc| {
        let mut state = lock(&highlight);
        if state.generation != generation {
            return;
        }
        state.node = None;
        if doc.exists(node) {
            let _ = doc.remove_class(node, PULSE_CLASS);
        }
    });
}
