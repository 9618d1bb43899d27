use crate::dom::ElementHandle;
use crate::error::InstructionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use strum::{AsRefStr, Display, EnumString};

/// DOM mutation requested by an instruction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum InstructionAction {
    #[serde(rename = "appendHTML")]
    #[strum(serialize = "appendHTML")]
    AppendHtml,
    #[serde(rename = "replaceHTML")]
    #[strum(serialize = "replaceHTML")]
    ReplaceHtml,
    #[serde(rename = "removeElement")]
    #[strum(serialize = "removeElement")]
    RemoveElement,
}

/// Instruction exactly as it arrives on the wire. Every field is optional so a
/// malformed instruction can be rejected with a precise reason instead of
/// failing the whole message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A validated instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub id: String,
    pub action: InstructionAction,
    pub selector: String,
    pub content: Option<String>,
    pub publish: bool,
    pub timestamp: Option<String>,
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, InstructionError> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or(InstructionError::MissingField(field))
}

impl RawInstruction {
    pub fn validate(&self) -> Result<Instruction, InstructionError> {
        let id = required(self.id.as_ref(), "id")?;
        let action = required(self.action.as_ref(), "action")?;
        let selector = required(self.selector.as_ref(), "selector")?;
        let action = action
            .parse::<InstructionAction>()
            .map_err(|_| InstructionError::UnknownAction(action))?;

        Ok(Instruction {
            id,
            action,
            selector,
            content: self.content.clone(),
            publish: self.publish.unwrap_or(false),
            timestamp: self.timestamp.clone(),
        })
    }
}

/// Pre-mutation state captured for one applied instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversionRecord {
    pub id: String,
    pub action: InstructionAction,
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Inner markup before append/replace, outer markup for a removal.
    pub original_content: String,
    /// Node that was mutated. Stale once the node leaves the document.
    #[serde(skip)]
    pub element: ElementHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_timestamp: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// Insertion-ordered `id → ReversionRecord` map. Overwriting an id keeps its
/// original position.
#[derive(Debug, Default)]
pub struct InjectionLog {
    records: IndexMap<String, ReversionRecord>,
}

impl InjectionLog {
    pub fn insert(&mut self, record: ReversionRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<&ReversionRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReversionRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, action: &str, selector: &str) -> RawInstruction {
        RawInstruction {
            id: Some(id.into()),
            action: Some(action.into()),
            selector: Some(selector.into()),
            ..RawInstruction::default()
        }
    }

    #[test]
    fn action_names_match_wire_format() {
        assert_eq!(InstructionAction::AppendHtml.to_string(), "appendHTML");
        assert_eq!(
            "removeElement".parse::<InstructionAction>().unwrap(),
            InstructionAction::RemoveElement
        );
        assert_eq!(
            serde_json::to_string(&InstructionAction::ReplaceHtml).unwrap(),
            "\"replaceHTML\""
        );
    }

    #[test]
    fn validate_rejects_each_missing_field() {
        for (field, mut instruction) in [
            ("id", raw("1", "appendHTML", "#a")),
            ("action", raw("1", "appendHTML", "#a")),
            ("selector", raw("1", "appendHTML", "#a")),
        ] {
            match field {
                "id" => instruction.id = None,
                "action" => instruction.action = None,
                _ => instruction.selector = Some("  ".into()),
            }
            let err = instruction.validate().unwrap_err();
            assert!(
                matches!(err, InstructionError::MissingField(f) if f == field),
                "expected missing {field}, got {err}"
            );
        }
    }

    #[test]
    fn validate_rejects_unknown_action() {
        let err = raw("x", "frobnicate", "#a").validate().unwrap_err();
        assert!(matches!(err, InstructionError::UnknownAction(a) if a == "frobnicate"));
    }

    #[test]
    fn raw_instruction_tolerates_missing_fields() {
        let parsed: RawInstruction =
            serde_json::from_str(r##"{"id":"1","selector":"#a","publish":true}"##).unwrap();
        assert_eq!(parsed.action, None);
        assert_eq!(parsed.publish, Some(true));
    }

    #[test]
    fn injection_log_overwrite_keeps_position() {
        use crate::dom::{Dom, HtmlDocument};

        let doc = HtmlDocument::parse(r#"<p id="a"></p>"#);
        let element = doc.query_selector("#a").unwrap().unwrap();
        let record = |id: &str, original: &str| ReversionRecord {
            id: id.into(),
            action: InstructionAction::ReplaceHtml,
            selector: "#a".into(),
            content: None,
            original_content: original.into(),
            element,
            instruction_timestamp: None,
            applied_at: Utc::now(),
        };

        let mut log = InjectionLog::default();
        log.insert(record("1", "first"));
        log.insert(record("2", "second"));
        log.insert(record("1", "third"));

        let ids: Vec<_> = log.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(log.get("1").unwrap().original_content, "third");
        assert_eq!(log.len(), 2);
    }
}
