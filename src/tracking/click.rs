use super::descriptor::ElementDescriptor;
use crate::dom::{Dom, ElementHandle};
use std::time::{Duration, Instant};

/// Turns raw click events into element descriptors.
///
/// Clicks are throttled on the leading edge: the first click in a window is
/// processed, everything else inside the window is dropped.
#[derive(Debug)]
pub struct ClickTracker {
    enabled: bool,
    throttle: Duration,
    max_text_chars: usize,
    last_processed: Option<Instant>,
}

impl ClickTracker {
    pub fn new(throttle: Duration, max_text_chars: usize) -> Self {
        Self {
            enabled: false,
            throttle,
            max_text_chars,
            last_processed: None,
        }
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            tracing::info!("element tracking enabled");
            self.enabled = true;
        }
    }

    pub fn disable<D: Dom + ?Sized>(&mut self, dom: &mut D) {
        if self.enabled {
            tracing::info!("element tracking disabled");
            self.enabled = false;
            self.last_processed = None;
            dom.set_highlight(None);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle_click<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        target: ElementHandle,
        now: Instant,
    ) -> Option<ElementDescriptor> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = self.last_processed
            && now.saturating_duration_since(last) < self.throttle
        {
            tracing::trace!("click dropped inside throttle window");
            return None;
        }
        self.last_processed = Some(now);

        dom.set_highlight(Some(target));
        match ElementDescriptor::describe(&*dom, target, self.max_text_chars) {
            Ok(descriptor) => {
                tracing::debug!(path = %descriptor.path, "element clicked");
                Some(descriptor)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to describe clicked element");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;

    fn setup() -> (HtmlDocument, ElementHandle, ClickTracker) {
        let doc = HtmlDocument::parse(r#"<button id="go">Go</button><p>x</p>"#);
        let button = doc.query_selector("#go").unwrap().unwrap();
        let tracker = ClickTracker::new(Duration::from_millis(300), 100);
        (doc, button, tracker)
    }

    #[test]
    fn disabled_tracker_ignores_clicks() {
        let (mut doc, button, mut tracker) = setup();
        assert!(tracker.handle_click(&mut doc, button, Instant::now()).is_none());
        assert!(doc.highlighted().is_none());
    }

    #[test]
    fn clicks_inside_window_are_dropped() {
        let (mut doc, button, mut tracker) = setup();
        tracker.enable();
        let start = Instant::now();

        assert!(tracker.handle_click(&mut doc, button, start).is_some());
        assert!(
            tracker
                .handle_click(&mut doc, button, start + Duration::from_millis(299))
                .is_none()
        );
        assert!(
            tracker
                .handle_click(&mut doc, button, start + Duration::from_millis(300))
                .is_some()
        );
    }

    #[test]
    fn processed_click_moves_highlight() {
        let (mut doc, button, mut tracker) = setup();
        let p = doc.query_selector("p").unwrap().unwrap();
        tracker.enable();
        let start = Instant::now();

        tracker.handle_click(&mut doc, button, start);
        assert_eq!(doc.highlighted(), Some(button));
        tracker.handle_click(&mut doc, p, start + Duration::from_secs(1));
        assert_eq!(doc.highlighted(), Some(p));

        tracker.disable(&mut doc);
        assert!(doc.highlighted().is_none());
    }

    #[test]
    fn enable_and_disable_are_idempotent() {
        let (mut doc, _, mut tracker) = setup();
        tracker.enable();
        tracker.enable();
        assert!(tracker.is_enabled());
        tracker.disable(&mut doc);
        tracker.disable(&mut doc);
        assert!(!tracker.is_enabled());
    }
}
