// Arena-backed document tree.
//
// The scanner and annotator only ever see the host page through this type:
// nodes are addressed by stable `NodeId`s, removed nodes are tombstoned so an
// old id can never alias a newer node, and the few host services the engine
// needs (click dispatch, timers, scrolling, layout) live here as well.

use crate::error::DomError;
use crate::result::Rect;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Stable handle to a node. Holding one does not keep the node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Click handler. Returning `true` prevents the default action (navigation).
pub type ClickHandler = Arc<dyn Fn(&mut Document, NodeId) -> bool + Send + Sync>;

type TimerTask = Box<dyn FnOnce(&mut Document) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Listener {
    node: NodeId,
    handler: ClickHandler,
}

struct Timer {
    id: TimerId,
    deadline: Duration,
    task: TimerTask,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    pub default_prevented: bool,
    pub handled: usize,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub struct Document {
    nodes: Vec<Option<NodeData>>,
    listeners: Vec<Option<Listener>>,
    timers: Vec<Timer>,
    next_timer: u64,
    clock: Duration,
    values: HashMap<NodeId, String>,
    layout: HashMap<NodeId, Rect>,
    scrolled_to: Option<NodeId>,
    url: Option<String>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("nodes", &self.nodes.iter().filter(|n| n.is_some()).count())
            .field("listeners", &self.listeners.iter().filter(|l| l.is_some()).count())
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document containing only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            })],
            listeners: Vec::new(),
            timers: Vec::new(),
            next_timer: 0,
            clock: Duration::ZERO,
            values: HashMap::new(),
            layout: HashMap::new(),
            scrolled_to: None,
            url: None,
        }
    }

    /// Build a document from HTML source using a full HTML5 parse
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self::new();
        let root = doc.root();

        let mut mapped = HashMap::new();
        mapped.insert(parsed.tree.root().id(), root);

        // Pre-order traversal guarantees parents are mapped before children
        for node in parsed.tree.root().descendants().skip(1) {
            let Some(parent) = node.parent().and_then(|p| mapped.get(&p.id()).copied()) else {
                continue;
            };

            let kind = match node.value() {
                scraper::Node::Element(el) => NodeKind::Element(ElementData {
                    tag: el.name().to_lowercase(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                scraper::Node::Text(text) => NodeKind::Text(text.text.to_string()),
                scraper::Node::Comment(comment) => NodeKind::Comment(comment.comment.to_string()),
                _ => continue,
            };

            let id = doc.push_node(kind);
            doc.link(parent, id);
            mapped.insert(node.id(), id);
        }

        doc
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|d| &d.kind)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|d| d.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Nearest ancestor (or self) that is an element
    pub fn closest_element(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_element(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Whether the node can still be reached from the document root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if !self.exists(current) {
                return false;
            }
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Depth-first, document-order walk of `id` and everything below it.
    ///
    /// Fails when a child link points at a node that no longer exists.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        if !self.exists(id) {
            return Err(DomError::MissingNode(id));
        }

        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let data = self.data(node).ok_or(DomError::MissingNode(node))?;
            out.push(node);
            for child in data.children.iter().rev() {
                stack.push(*child);
            }
        }
        Ok(out)
    }

    /// Every attached element in document order
    pub fn elements(&self) -> Result<Vec<NodeId>, DomError> {
        Ok(self
            .descendants(self.root())?
            .into_iter()
            .filter(|n| self.is_element(*n))
            .collect())
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.elements()
            .unwrap_or_default()
            .into_iter()
            .filter(|n| self.tag(*n) == Some(tag))
            .collect()
    }

    pub fn find_by_id(&self, id_value: &str) -> Option<NodeId> {
        self.elements()
            .unwrap_or_default()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id_value))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.elements_by_tag("head").into_iter().next()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.elements_by_tag("body").into_iter().next()
    }

    /// Concatenated text of every text node below `id`
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_content_excluding(id, &HashSet::new())
    }

    /// [`Document::text_content`] without the text nodes listed in `excluded`
    pub fn text_content_excluding(&self, id: NodeId, excluded: &HashSet<NodeId>) -> String {
        let mut out = String::new();
        for node in self.descendants(id).unwrap_or_default() {
            if excluded.contains(&node) {
                continue;
            }
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).iter().any(|c| c == class)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// New detached element; attach it with [`Document::append_child`]
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent_ok = matches!(
            self.kind(parent),
            Some(NodeKind::Element(_)) | Some(NodeKind::Document)
        );
        let child_free = self.exists(child) && self.parent(child).is_none() && child != self.root();
        if !parent_ok || !child_free || self.is_ancestor_or_self(child, parent) {
            return Err(DomError::InvalidAppend { parent, child });
        }

        self.link(parent, child);
        Ok(())
    }

    /// Attach the detached node `node` as the next sibling of `reference`
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        let node_free = self.exists(node) && self.parent(node).is_none() && node != self.root();
        if !node_free || self.is_ancestor_or_self(node, parent) {
            return Err(DomError::InvalidAppend {
                parent,
                child: node,
            });
        }

        if let Some(Some(data)) = self.nodes.get_mut(parent.0) {
            let index = data
                .children
                .iter()
                .position(|c| *c == reference)
                .map(|i| i + 1)
                .unwrap_or(data.children.len());
            data.children.insert(index, node);
        }
        if let Some(Some(data)) = self.nodes.get_mut(node.0) {
            data.parent = Some(parent);
        }
        Ok(())
    }

    /// Detach `id` and tombstone its whole subtree
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        if id == self.root() {
            return Err(DomError::InvalidAppend {
                parent: id,
                child: id,
            });
        }
        let subtree = self.descendants(id)?;

        if let Some(parent) = self.parent(id)
            && let Some(Some(data)) = self.nodes.get_mut(parent.0)
        {
            data.children.retain(|c| *c != id);
        }

        for node in subtree {
            self.nodes[node.0] = None;
            self.values.remove(&node);
            self.layout.remove(&node);
            for slot in self.listeners.iter_mut() {
                if slot.as_ref().is_some_and(|l| l.node == node) {
                    *slot = None;
                }
            }
            if self.scrolled_to == Some(node) {
                self.scrolled_to = None;
            }
        }
        Ok(())
    }

    /// Detach `id` from its parent but keep it alive (it can be re-appended)
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.parent(id).ok_or(DomError::Detached(id))?;
        if let Some(Some(data)) = self.nodes.get_mut(parent.0) {
            data.children.retain(|c| *c != id);
        }
        if let Some(Some(data)) = self.nodes.get_mut(id.0) {
            data.parent = None;
        }
        Ok(())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let el = self.element_mut(id)?;
        match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(id)?;
        el.attrs.retain(|(k, _)| k != name);
        Ok(())
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        let mut classes = self.class_list(id);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
        self.set_attr(id, "class", &classes.join(" "))
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        if self.attr(id, "class").is_none() {
            self.element_mut(id)?;
            return Ok(());
        }
        let classes: Vec<String> = self
            .class_list(id)
            .into_iter()
            .filter(|c| c != class)
            .collect();
        self.set_attr(id, "class", &classes.join(" "))
    }

    // ------------------------------------------------------------------
    // Form controls
    // ------------------------------------------------------------------

    /// Set the live value of a form control (what the user typed)
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?;
        self.values.insert(id, value.to_string());
        Ok(())
    }

    /// Current value of a control: live value, then the `value` attribute,
    /// then textarea text, then the selected option of a select.
    pub fn control_value(&self, id: NodeId) -> Option<String> {
        self.control_value_excluding(id, &HashSet::new())
    }

    /// [`Document::control_value`] ignoring text that comes from `excluded` nodes
    pub fn control_value_excluding(
        &self,
        id: NodeId,
        excluded: &HashSet<NodeId>,
    ) -> Option<String> {
        if let Some(value) = self.values.get(&id) {
            return Some(value.clone());
        }
        let tag = self.tag(id)?;
        if let Some(value) = self.attr(id, "value") {
            return Some(value.to_string());
        }
        match tag {
            "textarea" | "option" => Some(self.text_content_excluding(id, excluded)),
            "select" => {
                let options: Vec<NodeId> = self
                    .descendants(id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|n| self.tag(*n) == Some("option"))
                    .collect();
                options
                    .iter()
                    .find(|o| self.attr(**o, "selected").is_some())
                    .or_else(|| options.first())
                    .and_then(|o| self.control_value_excluding(*o, excluded))
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    pub fn set_layout(&mut self, id: NodeId, rect: Rect) {
        self.layout.insert(id, rect);
    }

    /// Geometry published by the host, zero when none was published
    pub fn layout(&self, id: NodeId) -> Rect {
        self.layout.get(&id).copied().unwrap_or_default()
    }

    /// CSS path to an element, anchored at the closest ancestor with an id
    pub fn selector(&self, id: NodeId) -> Result<String, DomError> {
        if !self.is_attached(id) {
            return Err(DomError::Detached(id));
        }
        let el = self.closest_element(id).ok_or(DomError::NotElement(id))?;

        let mut segments = Vec::new();
        let mut current = Some(el);
        while let Some(node) = current {
            let Some(tag) = self.tag(node) else {
                break;
            };
            if let Some(id_value) = self.attr(node, "id")
                && is_simple_ident(id_value)
            {
                segments.push(format!("#{}", id_value));
                break;
            }
            let (index, count) = self.same_tag_position(node);
            if count > 1 {
                segments.push(format!("{}:nth-of-type({})", tag, index));
            } else {
                segments.push(tag.to_string());
            }
            current = self.parent(node);
        }

        segments.reverse();
        Ok(segments.join(" > "))
    }

    /// Absolute XPath to an element, e.g. `/html/body/div[2]/a`
    pub fn xpath(&self, id: NodeId) -> Result<String, DomError> {
        if !self.is_attached(id) {
            return Err(DomError::Detached(id));
        }
        let el = self.closest_element(id).ok_or(DomError::NotElement(id))?;

        let mut segments = Vec::new();
        let mut current = Some(el);
        while let Some(node) = current {
            let Some(tag) = self.tag(node) else {
                break;
            };
            let (index, count) = self.same_tag_position(node);
            if count > 1 {
                segments.push(format!("{}[{}]", tag, index));
            } else {
                segments.push(tag.to_string());
            }
            current = self.parent(node);
        }

        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    // ------------------------------------------------------------------
    // Host services: events, timers, scrolling
    // ------------------------------------------------------------------

    pub fn add_listener(&mut self, node: NodeId, handler: ClickHandler) -> ListenerId {
        self.listeners.push(Some(Listener { node, handler }));
        ListenerId(self.listeners.len() - 1)
    }

    /// Returns false when the listener was already gone
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        match self.listeners.get_mut(id.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners
            .iter()
            .flatten()
            .filter(|l| l.node == node)
            .count()
    }

    /// Dispatch a click at `target`, bubbling up through its ancestors
    pub fn click(&mut self, target: NodeId) -> ClickOutcome {
        let mut outcome = ClickOutcome::default();
        if !self.is_attached(target) {
            return outcome;
        }

        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }

        for node in path {
            let handlers: Vec<ClickHandler> = self
                .listeners
                .iter()
                .flatten()
                .filter(|l| l.node == node)
                .map(|l| l.handler.clone())
                .collect();

            for handler in handlers {
                outcome.handled += 1;
                if handler(self, node) {
                    outcome.default_prevented = true;
                }
            }
        }
        outcome
    }

    pub fn set_timeout<F>(&mut self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce(&mut Document) + Send + Sync + 'static,
    {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.push(Timer {
            id,
            deadline: self.clock + delay,
            task: Box::new(task),
        });
        id
    }

    pub fn clear_timeout(&mut self, id: TimerId) {
        self.timers.retain(|t| t.id != id);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Virtual time since the document was created
    pub fn now(&self) -> Duration {
        self.clock
    }

    /// Move the clock forward, running every timer that falls due in deadline order
    pub fn advance(&mut self, by: Duration) {
        let target = self.clock + by;
        loop {
            let due = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.deadline <= target)
                .min_by_key(|(_, t)| (t.deadline, t.id.0))
                .map(|(i, _)| i);

            let Some(index) = due else {
                break;
            };
            let timer = self.timers.remove(index);
            self.clock = self.clock.max(timer.deadline);
            (timer.task)(self);
        }
        self.clock = target;
    }

    pub fn scroll_into_view(&mut self, id: NodeId) {
        if self.is_attached(id) {
            self.scrolled_to = Some(id);
        }
    }

    pub fn scrolled_to(&self) -> Option<NodeId> {
        self.scrolled_to
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        for child in self.children(self.root()) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Document => {}
            NodeKind::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag(p))
                    .is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Tombstone the last child of `parent` while leaving the parent's link to
    /// it in place, so traversal runs into a dangling id
    #[cfg(test)]
    pub(crate) fn break_last_child(&mut self, parent: NodeId) {
        if let Some(child) = self.children(parent).last().copied() {
            self.nodes[child.0] = None;
        }
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.nodes.get_mut(id.0) {
            Some(Some(NodeData {
                kind: NodeKind::Element(el),
                ..
            })) => Ok(el),
            Some(Some(_)) => Err(DomError::NotElement(id)),
            _ => Err(DomError::MissingNode(id)),
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        NodeId(self.nodes.len() - 1)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(Some(data)) = self.nodes.get_mut(parent.0) {
            data.children.push(child);
        }
        if let Some(Some(data)) = self.nodes.get_mut(child.0) {
            data.parent = Some(parent);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// 1-based index among same-tag element siblings, and how many there are
    fn same_tag_position(&self, id: NodeId) -> (usize, usize) {
        let tag = self.tag(id);
        let Some(parent) = self.parent(id) else {
            return (1, 1);
        };
        let siblings: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|s| self.tag(*s).is_some() && self.tag(*s) == tag)
            .collect();
        let index = siblings.iter().position(|s| *s == id).unwrap_or(0) + 1;
        (index, siblings.len())
    }
}

fn is_simple_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
