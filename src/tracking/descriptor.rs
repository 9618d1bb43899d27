use crate::dom::{Dom, ElementHandle, selector_path};
use crate::error::{DomError, InstructionError};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EXCLUDED_ATTRIBUTES: [&str; 3] = ["id", "class", "style"];

/// Structured description of a clicked element, sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub page_path: String,
    pub timestamp: String,
    /// Selector path of the element, see [`selector_path`].
    pub path: String,
}

impl ElementDescriptor {
    pub fn describe<D: Dom + ?Sized>(
        dom: &D,
        element: ElementHandle,
        max_text_chars: usize,
    ) -> Result<Self, DomError> {
        let facts = dom.element_facts(element)?;
        let path = selector_path(dom, element)?;

        let href = facts.attributes.get("href").cloned();
        let value = facts.attributes.get("value").cloned();
        let attributes = facts
            .attributes
            .into_iter()
            .filter(|(name, _)| !EXCLUDED_ATTRIBUTES.contains(&name.as_str()))
            .collect();

        Ok(Self {
            tag_name: facts.tag_name.to_ascii_uppercase(),
            id: facts.id.unwrap_or_default(),
            class_name: facts.classes.join(" "),
            attributes,
            text: truncate_text(&facts.text, max_text_chars),
            href,
            value,
            page_path: dom.page_path(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path,
        })
    }

    /// Describe the first element matching `selector`, as a click on it would.
    pub fn describe_selector<D: Dom + ?Sized>(
        dom: &D,
        selector: &str,
        max_text_chars: usize,
    ) -> crate::Result<Self> {
        let element =
            dom.query_selector(selector)?
                .ok_or_else(|| InstructionError::ElementNotFound {
                    selector: selector.to_string(),
                })?;
        Ok(Self::describe(dom, element, max_text_chars)?)
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
