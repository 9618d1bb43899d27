use super::traits::{Dom, ElementFacts, ElementHandle};
use crate::error::DomError;
use std::fmt::Write;

/// Build a CSS-like path identifying `element`, e.g.
/// `div#main > p.lead:nth-of-type(2)`.
///
/// The walk stops at the first ancestor carrying an id.
pub fn selector_path<D: Dom + ?Sized>(dom: &D, element: ElementHandle) -> Result<String, DomError> {
    let mut segments = Vec::new();
    let mut current = Some(element);

    while let Some(handle) = current {
        let facts = dom.element_facts(handle)?;
        let anchored = facts.id.as_deref().is_some_and(|id| !id.is_empty());
        segments.push(segment(&facts));
        if anchored {
            break;
        }
        current = dom.parent_element(handle);
    }

    segments.reverse();
    Ok(segments.join(" > "))
}

fn segment(facts: &ElementFacts) -> String {
    let mut out = facts.tag_name.to_ascii_lowercase();

    if let Some(id) = facts.id.as_deref().filter(|id| !id.is_empty()) {
        out.push('#');
        out.push_str(&escape_ident(id));
        return out;
    }

    for class in facts.classes.iter().filter(|class| !class.is_empty()) {
        out.push('.');
        out.push_str(&escape_ident(class));
    }
    if let Some(n) = facts.nth_of_type {
        let _ = write!(out, ":nth-of-type({n})");
    }
    out
}

/// Serialize `ident` as a CSS identifier, following `CSS.escape`.
fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let lone_dash = ident == "-";
    let starts_with_dash = ident.starts_with('-');

    for (index, c) in ident.chars().enumerate() {
        let leading_digit =
            c.is_ascii_digit() && (index == 0 || (index == 1 && starts_with_dash));
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => {
                let _ = write!(out, "\\{:x} ", u32::from(c));
            }
            _ if leading_digit => {
                let _ = write!(out, "\\{:x} ", u32::from(c));
            }
            '-' if lone_dash => out.push_str("\\-"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => {
                out.push(c);
            }
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;

    #[test]
    fn path_stops_at_nearest_id() {
        let doc = HtmlDocument::parse(
            r#"<div id="main"><section><p>a</p><p class="x y">b</p></section></div>"#,
        );
        let p = doc.query_selector("p.x").unwrap().unwrap();
        assert_eq!(
            selector_path(&doc, p).unwrap(),
            "div#main > section > p.x.y:nth-of-type(2)"
        );
    }

    #[test]
    fn path_without_ids_reaches_the_root() {
        let doc = HtmlDocument::parse("<ul><li>a</li></ul>");
        let li = doc.query_selector("li").unwrap().unwrap();
        assert_eq!(selector_path(&doc, li).unwrap(), "html > body > ul > li");
    }

    #[test]
    fn element_with_id_is_its_own_path() {
        let doc = HtmlDocument::parse(r#"<button id="buy">Buy</button>"#);
        let button = doc.query_selector("#buy").unwrap().unwrap();
        assert_eq!(selector_path(&doc, button).unwrap(), "button#buy");
    }

    #[test]
    fn escape_ident_matches_css_escape() {
        assert_eq!(escape_ident("item:1"), r"item\:1");
        assert_eq!(escape_ident("w-1/2"), r"w-1\/2");
        assert_eq!(escape_ident("1st"), r"\31 st");
        assert_eq!(escape_ident("-2x"), r"-\32 x");
        assert_eq!(escape_ident("-"), r"\-");
        assert_eq!(escape_ident("café_ok-9"), "café_ok-9");
    }

    #[test]
    fn id_with_punctuation_resolves_back() {
        let doc = HtmlDocument::parse(r#"<p id="item:1">a</p>"#);
        let p = doc.query_selector("p").unwrap().unwrap();
        let path = selector_path(&doc, p).unwrap();
        assert_eq!(path, r"p#item\:1");
        assert_eq!(doc.query_selector(&path).unwrap(), Some(p));
    }

    #[test]
    fn class_with_slash_resolves_back() {
        let doc = HtmlDocument::parse(r#"<div><span class="w-1/2">a</span></div>"#);
        let span = doc.query_selector("span").unwrap().unwrap();
        let path = selector_path(&doc, span).unwrap();
        assert_eq!(path, r"html > body > div > span.w-1\/2");
        assert_eq!(doc.query_selector(&path).unwrap(), Some(span));
    }

    #[test]
    fn id_with_leading_digit_resolves_back() {
        let doc = HtmlDocument::parse(r#"<main><b id="42">a</b></main>"#);
        let b = doc.query_selector("b").unwrap().unwrap();
        let path = selector_path(&doc, b).unwrap();
        assert_eq!(doc.query_selector(&path).unwrap(), Some(b));
    }

    #[test]
    fn path_resolves_back_to_the_same_element() {
        let doc = HtmlDocument::parse(
            r#"<main><div><span>1</span><span class="k">2</span></div></main>"#,
        );
        let span = doc.query_selector("span.k").unwrap().unwrap();
        let path = selector_path(&doc, span).unwrap();
        assert_eq!(doc.query_selector(&path).unwrap(), Some(span));
    }
}
