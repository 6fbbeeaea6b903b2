use crate::annotator::INJECTED_ATTR;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::keywords::KeywordSet;
use crate::matcher::{MatchMode, matches};
use crate::result::{EXCERPT_LEN, Location, ResultKind, ScanResult, truncate};
use crate::store::ResultStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use url::Url;

/// Containers whose text is never rendered as page content
const NON_RENDERED_CONTAINERS: &[&str] = &["script", "style", "noscript", "template"];

/// Cosmetic, accessibility and bookkeeping attributes ignored by the attribute pass
const SKIPPED_ATTRIBUTES: &[&str] = &[
    "style",
    "class",
    "id",
    "role",
    "tabindex",
    "lang",
    "dir",
    "hidden",
    "width",
    "height",
    "align",
    "draggable",
    "spellcheck",
    "translate",
    "contenteditable",
    "autocomplete",
];

const SKIPPED_PREFIXES: &[&str] = &["data-", "aria-"];

/// Attributes that carry a network address are always inspected
const ADDRESS_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];
const ADDRESS_NAME_HINTS: &[&str] = &["url", "link", "href", "src", "action", "endpoint"];

/// Tags whose `href` is reported as a link rather than a plain attribute
const LINK_TAGS: &[&str] = &["a", "area", "link"];

const IMAGE_ATTRIBUTES: &[&str] = &["alt", "title", "src"];

const FORM_CONTROLS: &[&str] = &["input", "textarea", "select", "option", "button"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub mode: MatchMode,
    pub excerpt_len: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Exact,
            excerpt_len: EXCERPT_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// What a caller gets when it asks for a scan while another one is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Hand back the last completed result set without scanning or queueing
    #[default]
    ReturnStale,
}

/// Walks a document and records every place a keyword shows up.
///
/// Four passes run in a fixed order (text, attributes, images, form
/// controls) so output ordering is deterministic. Only one scan runs at a
/// time; see [`OverlapPolicy`].
pub struct TreeScanner {
    options: ScanOptions,
    policy: OverlapPolicy,
    scanning: AtomicBool,
    last_results: Mutex<Vec<ScanResult>>,
}

/// Resets the in-flight flag when a scan finishes, fails or is dropped
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl TreeScanner {
    pub fn new() -> Self {
        Self::with_options(ScanOptions::default())
    }

    pub fn with_options(options: ScanOptions) -> Self {
        Self {
            options,
            policy: OverlapPolicy::default(),
            scanning: AtomicBool::new(false),
            last_results: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    pub fn set_mode(&mut self, mode: MatchMode) {
        self.options.mode = mode;
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn state(&self) -> ScanState {
        if self.scanning.load(Ordering::Acquire) {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    /// Result set of the last scan that ran to completion
    pub fn last_results(&self) -> Vec<ScanResult> {
        self.last_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.last_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Scan `doc` for every keyword in `keywords`.
    ///
    /// While another scan is in flight this returns the previous completed
    /// result set immediately. A traversal failure surfaces as an error and
    /// leaves the scanner idle so the caller can retry.
    pub async fn scan(&self, doc: &Document, keywords: &KeywordSet) -> Result<Vec<ScanResult>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            match self.policy {
                OverlapPolicy::ReturnStale => {
                    debug!("Scan already in progress, returning previous results");
                    return Ok(self.last_results());
                }
            }
        }
        let _guard = ScanGuard {
            flag: &self.scanning,
        };

        info!(
            "Starting scan for {} keywords ({} mode)",
            keywords.len(),
            self.options.mode.as_str()
        );

        let mut store = ResultStore::new();
        let excluded = injected_nodes(doc)?;

        self.text_pass(doc, keywords, &excluded, &mut store)?;
        tokio::task::yield_now().await;

        self.attribute_pass(doc, keywords, &excluded, &mut store)?;
        tokio::task::yield_now().await;

        self.image_pass(doc, keywords, &excluded, &mut store)?;
        tokio::task::yield_now().await;

        self.form_pass(doc, keywords, &excluded, &mut store)?;

        let results = store.to_vec();
        info!("Scan complete. {} matches", results.len());

        *self
            .last_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = results.clone();
        Ok(results)
    }

    fn text_pass(
        &self,
        doc: &Document,
        keywords: &KeywordSet,
        excluded: &HashSet<NodeId>,
        store: &mut ResultStore,
    ) -> Result<()> {
        for node in doc.descendants(doc.root())? {
            if excluded.contains(&node) {
                continue;
            }
            let Some(text) = doc.text(node) else {
                continue;
            };
            let Some(container) = doc.parent(node).filter(|p| doc.is_element(*p)) else {
                continue;
            };
            if doc
                .tag(container)
                .is_some_and(|t| NON_RENDERED_CONTAINERS.contains(&t))
            {
                continue;
            }

            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            for keyword in keywords {
                if matches(trimmed, keyword, self.options.mode) {
                    store.add(ScanResult::from_node(
                        ResultKind::Text,
                        keyword,
                        container,
                        locate(doc, container),
                        truncate(trimmed, self.options.excerpt_len),
                    ));
                }
            }
        }
        debug!("Text pass done, {} results so far", store.len());
        Ok(())
    }

    fn attribute_pass(
        &self,
        doc: &Document,
        keywords: &KeywordSet,
        excluded: &HashSet<NodeId>,
        store: &mut ResultStore,
    ) -> Result<()> {
        for el in doc.elements()? {
            if excluded.contains(&el) {
                continue;
            }
            let Some(data) = doc.element(el) else {
                continue;
            };

            for (name, value) in &data.attrs {
                if should_skip_attribute(name, value) {
                    continue;
                }

                let kind = if name == "href" && LINK_TAGS.contains(&data.tag.as_str()) {
                    ResultKind::LinkHref
                } else {
                    ResultKind::Attribute
                };

                for keyword in keywords {
                    if matches(value, keyword, self.options.mode) {
                        store.add(ScanResult::from_node(
                            kind,
                            keyword,
                            el,
                            locate(doc, el),
                            truncate(&format!("{}=\"{}\"", name, value), self.options.excerpt_len),
                        ));
                    }
                }
            }
        }
        debug!("Attribute pass done, {} results so far", store.len());
        Ok(())
    }

    fn image_pass(
        &self,
        doc: &Document,
        keywords: &KeywordSet,
        excluded: &HashSet<NodeId>,
        store: &mut ResultStore,
    ) -> Result<()> {
        for el in doc.elements()? {
            if excluded.contains(&el) || !is_image(doc, el) {
                continue;
            }

            for attr in IMAGE_ATTRIBUTES {
                let Some(value) = doc.attr(el, attr) else {
                    continue;
                };
                for keyword in keywords {
                    if matches(value, keyword, self.options.mode) {
                        store.add(ScanResult::from_node(
                            ResultKind::Image,
                            keyword,
                            el,
                            locate(doc, el),
                            truncate(&format!("{}=\"{}\"", attr, value), self.options.excerpt_len),
                        ));
                    }
                }
            }
        }
        debug!("Image pass done, {} results so far", store.len());
        Ok(())
    }

    fn form_pass(
        &self,
        doc: &Document,
        keywords: &KeywordSet,
        excluded: &HashSet<NodeId>,
        store: &mut ResultStore,
    ) -> Result<()> {
        for el in doc.elements()? {
            if excluded.contains(&el) {
                continue;
            }
            if !doc.tag(el).is_some_and(|t| FORM_CONTROLS.contains(&t)) {
                continue;
            }

            let fields = [
                ("value", doc.control_value_excluding(el, excluded)),
                ("placeholder", doc.attr(el, "placeholder").map(String::from)),
                ("label", label_text(doc, el, excluded)),
            ];

            for (field, text) in fields {
                let Some(text) = text else {
                    continue;
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                for keyword in keywords {
                    if matches(text, keyword, self.options.mode) {
                        store.add(ScanResult::from_node(
                            ResultKind::Form,
                            keyword,
                            el,
                            locate(doc, el),
                            truncate(&format!("{}: {}", field, text), self.options.excerpt_len),
                        ));
                    }
                }
            }
        }
        debug!("Form pass done, {} results so far", store.len());
        Ok(())
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Skip cosmetic and bookkeeping attributes unless their name or value looks
/// like a network address
pub fn should_skip_attribute(name: &str, value: &str) -> bool {
    let name = name.to_lowercase();

    if ADDRESS_ATTRIBUTES.contains(&name.as_str())
        || ADDRESS_NAME_HINTS.iter().any(|hint| name.contains(hint))
        || is_absolute_address(value)
    {
        return false;
    }

    SKIPPED_ATTRIBUTES.contains(&name.as_str())
        || SKIPPED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Selector, XPath and geometry for a node, or a placeholder when the node
/// can no longer be located
pub fn locate(doc: &Document, node: NodeId) -> Location {
    match (doc.selector(node), doc.xpath(node)) {
        (Ok(selector), Ok(xpath)) => Location {
            selector,
            xpath,
            rect: doc.layout(node),
        },
        (Err(e), _) | (_, Err(e)) => {
            warn!("Could not locate node {}: {}", node, e);
            Location::placeholder()
        }
    }
}

/// Absolute URL with a host, such as `https://cdn.example.com/t.js`
fn is_absolute_address(value: &str) -> bool {
    Url::parse(value.trim()).is_ok_and(|url| url.has_host())
}

fn is_image(doc: &Document, el: NodeId) -> bool {
    match doc.tag(el) {
        Some("img") => true,
        Some("input") => doc
            .attr(el, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("image")),
        _ => false,
    }
}

/// Label shown for a control: `<label for>`, then a wrapping `<label>`, then `aria-label`
fn label_text(doc: &Document, el: NodeId, excluded: &HashSet<NodeId>) -> Option<String> {
    if let Some(id) = doc.attr(el, "id") {
        let explicit = doc
            .elements_by_tag("label")
            .into_iter()
            .find(|label| !excluded.contains(label) && doc.attr(*label, "for") == Some(id));
        if let Some(label) = explicit {
            return Some(doc.text_content_excluding(label, excluded));
        }
    }

    let mut current = doc.parent(el);
    while let Some(node) = current {
        if doc.tag(node) == Some("label") {
            return Some(doc.text_content_excluding(node, excluded));
        }
        current = doc.parent(node);
    }

    doc.attr(el, "aria-label").map(String::from)
}

/// Annotation markup and everything below it
fn injected_nodes(doc: &Document) -> Result<HashSet<NodeId>> {
    let mut excluded = HashSet::new();
    for el in doc.elements()? {
        if doc.attr(el, INJECTED_ATTR).is_some() && !excluded.contains(&el) {
            excluded.extend(doc.descendants(el)?);
        }
    }
    Ok(excluded)
}
