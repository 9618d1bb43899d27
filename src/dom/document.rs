use super::traits::{Dom, ElementFacts, ElementHandle};
use crate::error::DomError;
use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};

/// In-memory page backed by a `scraper` HTML tree.
///
/// Mutations edit the underlying `ego_tree` arena directly, so element
/// handles survive unrelated edits elsewhere in the document.
pub struct HtmlDocument {
    html: Html,
    location: String,
    highlighted: Option<NodeId>,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
            location: "/".to_string(),
            highlighted: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    fn element(&self, handle: ElementHandle) -> Result<ElementRef<'_>, DomError> {
        let node = self.html.tree.get(handle.0).ok_or(DomError::StaleHandle)?;
        ElementRef::wrap(node).ok_or(DomError::NotAnElement)
    }

    fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
        let children: Vec<NodeId> = self
            .html
            .tree
            .get(id)
            .ok_or(DomError::StaleHandle)?
            .children()
            .map(|child| child.id())
            .collect();
        for child in children {
            if let Some(mut node) = self.html.tree.get_mut(child) {
                node.detach();
            }
        }
        Ok(())
    }

    fn append_fragment(&mut self, id: NodeId, html: &str) -> Result<(), DomError> {
        // Keep the handle check ahead of parsing so a stale target is
        // reported even for empty fragments.
        self.element(ElementHandle(id))?;
        let fragment = Html::parse_fragment(html);
        for child in fragment.root_element().children() {
            graft(&mut self.html.tree, id, child);
        }
        Ok(())
    }
}

/// Deep-copy `source` (from another tree) as the last child of `parent`.
///
/// Copies with an explicit work stack so nesting depth is bounded by the heap,
/// not the call stack.
fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) {
    let mut pending = vec![(parent, source)];
    while let Some((parent, source)) = pending.pop() {
        let Some(mut parent_node) = tree.get_mut(parent) else {
            continue;
        };
        let copied = parent_node.append(source.value().clone()).id();
        // Reversed so the first child is popped, and appended, first.
        pending.extend(source.children().rev().map(|child| (copied, child)));
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|e| DomError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Elements whose text content is never rendered.
const HIDDEN_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Descendant text of `element`, skipping text inside hidden elements.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().take_while(|a| a.id() != element.id()).any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_TEXT_ELEMENTS.contains(&el.name()))
            });
            (!hidden).then_some(&**text)
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn nth_of_type(element: ElementRef<'_>) -> Option<usize> {
    let tag = element.value().name();
    let same_tag = |node: &NodeRef<'_, Node>| {
        node.value()
            .as_element()
            .is_some_and(|sibling| sibling.name() == tag)
    };
    let before = element.prev_siblings().filter(same_tag).count();
    let after = element.next_siblings().filter(same_tag).count();
    if before + after == 0 {
        None
    } else {
        Some(before + 1)
    }
}

impl Dom for HtmlDocument {
    fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError> {
        let selector = parse_selector(selector)?;
        // Walk from the root rather than the arena so detached nodes never match.
        Ok(self
            .html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|element| selector.matches(element))
            .map(|element| ElementHandle(element.id())))
    }

    fn inner_html(&self, element: ElementHandle) -> Result<String, DomError> {
        Ok(self.element(element)?.inner_html())
    }

    fn outer_html(&self, element: ElementHandle) -> Result<String, DomError> {
        Ok(self.element(element)?.html())
    }

    fn set_inner_html(&mut self, element: ElementHandle, html: &str) -> Result<(), DomError> {
        self.element(element)?;
        self.clear_children(element.0)?;
        self.append_fragment(element.0, html)
    }

    fn append_html(&mut self, element: ElementHandle, html: &str) -> Result<(), DomError> {
        self.append_fragment(element.0, html)
    }

    fn parent_element(&self, element: ElementHandle) -> Option<ElementHandle> {
        let parent = self.html.tree.get(element.0)?.parent()?;
        ElementRef::wrap(parent).map(|parent| ElementHandle(parent.id()))
    }

    fn remove(&mut self, element: ElementHandle) -> Result<(), DomError> {
        self.element(element)?;
        if self.highlighted == Some(element.0) {
            self.highlighted = None;
        }
        let mut node = self
            .html
            .tree
            .get_mut(element.0)
            .ok_or(DomError::StaleHandle)?;
        node.detach();
        Ok(())
    }

    fn is_attached(&self, element: ElementHandle) -> bool {
        let root = self.html.tree.root().id();
        self.html.tree.get(element.0).is_some_and(|node| {
            node.id() == root || node.ancestors().last().is_some_and(|top| top.id() == root)
        })
    }

    fn element_facts(&self, element: ElementHandle) -> Result<ElementFacts, DomError> {
        let element_ref = self.element(element)?;
        let value = element_ref.value();
        Ok(ElementFacts {
            tag_name: value.name().to_string(),
            id: value.id().map(str::to_string),
            classes: value.classes().map(str::to_string).collect(),
            attributes: value
                .attrs()
                .map(|(name, val)| (name.to_string(), val.to_string()))
                .collect(),
            text: collapse_whitespace(&visible_text(element_ref)),
            nth_of_type: nth_of_type(element_ref),
        })
    }

    fn set_highlight(&mut self, element: Option<ElementHandle>) {
        self.highlighted = element.map(|handle| handle.0);
    }

    fn highlighted(&self) -> Option<ElementHandle> {
        self.highlighted.map(ElementHandle)
    }

    fn page_path(&self) -> String {
        self.location.clone()
    }

    fn to_html(&self) -> String {
        self.html.html()
    }
}
