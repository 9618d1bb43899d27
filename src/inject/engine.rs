use super::types::{InjectionLog, Instruction, InstructionAction, RawInstruction, ReversionRecord};
use crate::dom::{Dom, ElementHandle};
use crate::error::InstructionError;
use chrono::Utc;

/// Result of a single `apply` call. Rejections are already logged.
#[derive(Debug)]
pub enum ApplyOutcome {
    Applied { id: String },
    Rejected(InstructionError),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Applies server instructions to a document and keeps reversion records.
#[derive(Debug, Default)]
pub struct InstructionEngine {
    dubbing: bool,
    force_apply_all: bool,
    log: InjectionLog,
}

impl InstructionEngine {
    pub fn new(dubbing: bool, force_apply_all: bool) -> Self {
        Self {
            dubbing,
            force_apply_all,
            log: InjectionLog::default(),
        }
    }

    pub fn set_dubbing(&mut self, enabled: bool) {
        tracing::info!(enabled, "dyna dubbing toggled");
        self.dubbing = enabled;
    }

    pub fn dubbing(&self) -> bool {
        self.dubbing
    }

    pub fn force_apply_all(&self) -> bool {
        self.force_apply_all
    }

    /// Publish gate: published instructions always pass; unpublished ones
    /// only while dubbing (or the force-apply-all override) is on.
    pub fn should_apply(&self, instruction: &Instruction) -> bool {
        instruction.publish || self.dubbing || self.force_apply_all
    }

    /// Validate, gate, locate, mutate and record. Never panics or propagates;
    /// one bad instruction leaves the engine ready for the next.
    pub fn apply<D: Dom + ?Sized>(&mut self, dom: &mut D, raw: &RawInstruction) -> ApplyOutcome {
        match self.try_apply(dom, raw) {
            Ok(record) => {
                let id = record.id.clone();
                tracing::info!(
                    instruction_id = %id,
                    action = %record.action,
                    selector = %record.selector,
                    "instruction applied"
                );
                self.log.insert(record);
                ApplyOutcome::Applied { id }
            }
            Err(error) => {
                log_rejection(raw, &error);
                ApplyOutcome::Rejected(error)
            }
        }
    }

    fn try_apply<D: Dom + ?Sized>(
        &self,
        dom: &mut D,
        raw: &RawInstruction,
    ) -> Result<ReversionRecord, InstructionError> {
        let instruction = raw.validate()?;

        if !self.should_apply(&instruction) {
            return Err(InstructionError::NotPublished { id: instruction.id });
        }

        let element = dom.query_selector(&instruction.selector)?.ok_or_else(|| {
            InstructionError::ElementNotFound {
                selector: instruction.selector.clone(),
            }
        })?;

        let original_content = match instruction.action {
            InstructionAction::AppendHtml => {
                let content = require_content(&instruction)?;
                let original = dom.inner_html(element)?;
                dom.append_html(element, content)?;
                original
            }
            InstructionAction::ReplaceHtml => {
                let content = require_content(&instruction)?;
                let original = dom.inner_html(element)?;
                dom.set_inner_html(element, content)?;
                original
            }
            InstructionAction::RemoveElement => {
                if dom.parent_element(element).is_none() {
                    return Err(InstructionError::NoParent {
                        selector: instruction.selector,
                    });
                }
                let original = dom.outer_html(element)?;
                dom.remove(element)?;
                original
            }
        };

        Ok(ReversionRecord {
            id: instruction.id,
            action: instruction.action,
            selector: instruction.selector,
            content: instruction.content,
            original_content,
            element,
            instruction_timestamp: instruction.timestamp,
            applied_at: Utc::now(),
        })
    }

    /// Snapshot of every reversion record, oldest first.
    pub fn injections(&self) -> Vec<ReversionRecord> {
        self.log.iter().cloned().collect()
    }

    pub fn injection(&self, id: &str) -> Option<&ReversionRecord> {
        self.log.get(id)
    }

    /// Current element for a recorded instruction: the stored handle while it
    /// is still attached, otherwise a fresh lookup by selector.
    pub fn resolve_target<D: Dom + ?Sized>(&self, dom: &D, id: &str) -> Option<ElementHandle> {
        let record = self.log.get(id)?;
        if dom.is_attached(record.element) {
            return Some(record.element);
        }
        dom.query_selector(&record.selector).ok().flatten()
    }
}

fn require_content(instruction: &Instruction) -> Result<&str, InstructionError> {
    instruction
        .content
        .as_deref()
        .filter(|content| !content.is_empty())
        .ok_or_else(|| InstructionError::MissingContent {
            action: instruction.action.to_string(),
        })
}

fn log_rejection(raw: &RawInstruction, error: &InstructionError) {
    let id = raw.id.as_deref().unwrap_or("<none>");
    let selector = raw.selector.as_deref().unwrap_or("<none>");
    match error {
        InstructionError::NotPublished { .. } => {
            tracing::debug!(instruction_id = id, "skipping unpublished instruction");
        }
        InstructionError::UnknownAction(action) => {
            tracing::warn!(instruction_id = id, action = %action, "unrecognized instruction action");
        }
        _ => {
            tracing::warn!(instruction_id = id, selector, error = %error, "instruction rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;

    const PAGE: &str = r#"<html><body>
        <h1 id="title">Old <em>title</em></h1>
        <div id="a"><i>y</i></div>
        <p class="note">note</p>
    </body></html>"#;

    fn instruction(id: &str, action: &str, selector: &str, content: Option<&str>) -> RawInstruction {
        RawInstruction {
            id: Some(id.into()),
            action: Some(action.into()),
            selector: Some(selector.into()),
            content: content.map(str::to_string),
            publish: Some(true),
            timestamp: Some("2026-01-01T00:00:00Z".into()),
        }
    }

    #[test]
    fn append_captures_original_inner_markup() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();

        let outcome = engine.apply(
            &mut doc,
            &instruction("1", "appendHTML", "#a", Some("<b>x</b>")),
        );
        assert!(outcome.is_applied());

        let a = doc.query_selector("#a").unwrap().unwrap();
        assert_eq!(doc.inner_html(a).unwrap(), "<i>y</i><b>x</b>");
        assert_eq!(engine.injection("1").unwrap().original_content, "<i>y</i>");
    }

    #[test]
    fn replace_swaps_inner_markup() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();

        engine.apply(
            &mut doc,
            &instruction("r", "replaceHTML", "#title", Some("<span>Hi</span>")),
        );

        let title = doc.query_selector("#title").unwrap().unwrap();
        assert_eq!(doc.inner_html(title).unwrap(), "<span>Hi</span>");
        let record = engine.injection("r").unwrap();
        assert_eq!(record.original_content, "Old <em>title</em>");
        assert_eq!(record.content.as_deref(), Some("<span>Hi</span>"));
    }

    #[test]
    fn remove_captures_outer_markup_and_detaches() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();

        let outcome = engine.apply(&mut doc, &instruction("d", "removeElement", ".note", None));
        assert!(outcome.is_applied());
        assert!(doc.query_selector(".note").unwrap().is_none());
        assert_eq!(
            engine.injection("d").unwrap().original_content,
            r#"<p class="note">note</p>"#
        );
    }

    #[test]
    fn remove_without_parent_is_rejected() {
        let mut doc = HtmlDocument::parse(PAGE);
        let before = doc.to_html();
        let mut engine = InstructionEngine::default();

        let outcome = engine.apply(&mut doc, &instruction("h", "removeElement", "html", None));
        assert!(matches!(outcome, ApplyOutcome::Rejected(InstructionError::NoParent { .. })));
        assert_eq!(doc.to_html(), before);
        assert!(engine.injections().is_empty());
    }

    #[test]
    fn missing_selector_never_mutates() {
        for action in ["appendHTML", "replaceHTML", "removeElement"] {
            let mut doc = HtmlDocument::parse(PAGE);
            let before = doc.to_html();
            let mut engine = InstructionEngine::default();
            let mut raw = instruction("1", action, "#a", Some("<b>x</b>"));
            raw.selector = None;

            let outcome = engine.apply(&mut doc, &raw);
            assert!(matches!(
                outcome,
                ApplyOutcome::Rejected(InstructionError::MissingField("selector"))
            ));
            assert_eq!(doc.to_html(), before, "{action} mutated the document");
            assert!(engine.injections().is_empty());
        }
    }

    #[test]
    fn publish_gate_respects_dubbing() {
        let unpublished = |id: &str| {
            let mut raw = instruction(id, "replaceHTML", "#a", Some("<u>z</u>"));
            raw.publish = Some(false);
            raw
        };

        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();
        let outcome = engine.apply(&mut doc, &unpublished("1"));
        assert!(matches!(
            outcome,
            ApplyOutcome::Rejected(InstructionError::NotPublished { .. })
        ));
        assert!(engine.injections().is_empty());

        let published = instruction("2", "replaceHTML", "#a", Some("<u>z</u>"));
        assert!(engine.apply(&mut doc, &published).is_applied());

        let mut doc = HtmlDocument::parse(PAGE);
        engine.set_dubbing(true);
        assert!(engine.apply(&mut doc, &unpublished("3")).is_applied());
    }

    #[test]
    fn force_apply_all_bypasses_gate() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::new(false, true);
        let mut raw = instruction("1", "appendHTML", "#a", Some("<b>x</b>"));
        raw.publish = None;
        assert!(engine.apply(&mut doc, &raw).is_applied());
    }

    #[test]
    fn unknown_action_leaves_document_unchanged() {
        let mut doc = HtmlDocument::parse(PAGE);
        let before = doc.to_html();
        let mut engine = InstructionEngine::default();
        let raw = RawInstruction {
            id: Some("x".into()),
            action: Some("frobnicate".into()),
            selector: Some("#a".into()),
            ..RawInstruction::default()
        };

        let outcome = engine.apply(&mut doc, &raw);
        assert!(matches!(outcome, ApplyOutcome::Rejected(InstructionError::UnknownAction(_))));
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn empty_content_is_rejected_for_append_and_replace() {
        for action in ["appendHTML", "replaceHTML"] {
            let mut doc = HtmlDocument::parse(PAGE);
            let mut engine = InstructionEngine::default();
            let outcome = engine.apply(&mut doc, &instruction("1", action, "#a", Some("")));
            assert!(matches!(
                outcome,
                ApplyOutcome::Rejected(InstructionError::MissingContent { .. })
            ));
        }
    }

    #[test]
    fn bad_selector_does_not_block_next_instruction() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();

        let bad = engine.apply(&mut doc, &instruction("1", "appendHTML", "div[", Some("<b/>")));
        assert!(matches!(bad, ApplyOutcome::Rejected(InstructionError::Dom(_))));

        let missing = engine.apply(&mut doc, &instruction("2", "appendHTML", "#nope", Some("<b/>")));
        assert!(matches!(
            missing,
            ApplyOutcome::Rejected(InstructionError::ElementNotFound { .. })
        ));

        let good = engine.apply(&mut doc, &instruction("3", "appendHTML", "#a", Some("<b>x</b>")));
        assert!(good.is_applied());
        assert_eq!(engine.injections().len(), 1);
    }

    #[test]
    fn resolve_target_falls_back_to_selector_after_replacement() {
        let mut doc = HtmlDocument::parse(PAGE);
        let mut engine = InstructionEngine::default();
        engine.apply(&mut doc, &instruction("1", "appendHTML", "#a", Some("<b>x</b>")));

        let recorded = engine.injection("1").unwrap().element;
        assert_eq!(engine.resolve_target(&doc, "1"), Some(recorded));

        let body = doc.query_selector("body").unwrap().unwrap();
        doc.set_inner_html(body, r#"<div id="a">fresh</div>"#).unwrap();
        let resolved = engine.resolve_target(&doc, "1").unwrap();
        assert_ne!(resolved, recorded);
        assert_eq!(doc.inner_html(resolved).unwrap(), "fresh");
    }
}
