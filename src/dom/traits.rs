use crate::error::DomError;
use ego_tree::NodeId;
use std::collections::BTreeMap;

/// Stable identity of an element inside a [`Dom`].
///
/// The handle stays valid while the node lives in the document arena. Once
/// the node is detached it still resolves, but [`Dom::is_attached`] reports
/// `false`; callers holding onto handles should re-resolve by selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub(crate) NodeId);

/// Everything the click reporter and the selector path builder need to know
/// about one element, read in a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementFacts {
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// All attributes, including `id`, `class` and `style`.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated descendant text, whitespace collapsed.
    pub text: String,
    /// 1-based position among same-tag siblings, `None` when the element is
    /// the only one of its tag under its parent.
    pub nth_of_type: Option<usize>,
}

/// Core document trait: the page the client observes and mutates.
///
/// All operations are synchronous; the host drives them from its event loop.
pub trait Dom {
    /// First attached element matching `selector`.
    fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError>;

    fn inner_html(&self, element: ElementHandle) -> Result<String, DomError>;

    fn outer_html(&self, element: ElementHandle) -> Result<String, DomError>;

    /// Replace every child of `element` with the parsed `html` fragment.
    fn set_inner_html(&mut self, element: ElementHandle, html: &str) -> Result<(), DomError>;

    /// Parse `html` and append the resulting nodes after the current children.
    fn append_html(&mut self, element: ElementHandle, html: &str) -> Result<(), DomError>;

    /// Parent element, `None` for the document root or a detached node.
    fn parent_element(&self, element: ElementHandle) -> Option<ElementHandle>;

    /// Detach `element` from its parent.
    fn remove(&mut self, element: ElementHandle) -> Result<(), DomError>;

    fn is_attached(&self, element: ElementHandle) -> bool;

    fn element_facts(&self, element: ElementHandle) -> Result<ElementFacts, DomError>;

    /// Mark `element` as the highlighted one, clearing any previous highlight.
    fn set_highlight(&mut self, element: Option<ElementHandle>);

    fn highlighted(&self) -> Option<ElementHandle>;

    /// Path component of the page location, e.g. `/checkout`.
    fn page_path(&self) -> String;

    /// Serialize the whole document.
    fn to_html(&self) -> String;
}
