use scraper::Selector;
use tracing::{debug, info, warn};

pub mod document;

pub use document::{ElementHandle, PreviewAccess, PreviewDocument, HIGHLIGHT_CLASS};

use crate::error::StudioResult;
use crate::messenger::{PreviewMessage, PreviewPort, SelectedElementEvent};
use crate::selector;

/// Inspector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorState {
    Disabled,
    Enabled,
}

/// What happened to a click delivered to the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Inspector is disabled; the page handles the click itself
    PassThrough,
    /// Default action prevented and propagation stopped; the event was posted
    Captured(SelectedElementEvent),
}

/// Hover/click capture running inside the preview document
pub struct Inspector {
    document: PreviewDocument,
    port: PreviewPort,
    state: InspectorState,
    hovered: Option<ElementHandle>,
    scope: Option<String>,
}

impl Inspector {
    pub fn new(document: PreviewDocument, port: PreviewPort) -> Self {
        Self {
            document,
            port,
            state: InspectorState::Disabled,
            hovered: None,
            scope: None,
        }
    }

    pub fn state(&self) -> InspectorState {
        self.state
    }

    pub fn document(&self) -> &PreviewDocument {
        &self.document
    }

    pub fn hovered(&self) -> Option<ElementHandle> {
        self.hovered
    }

    /// Container selector used to synthesize relative field selectors
    pub fn set_scope(&mut self, scope: Option<String>) {
        self.scope = scope;
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Attach listeners. On access failure the inspector stays disabled.
    pub fn enable(&mut self) -> StudioResult<()> {
        if self.state == InspectorState::Enabled {
            return Ok(());
        }

        self.document.attach_listeners()?;
        self.state = InspectorState::Enabled;
        info!("Inspector enabled on {}", self.document.url());
        Ok(())
    }

    /// Detach listeners and clear any highlight
    pub fn disable(&mut self) {
        if let Some(previous) = self.hovered.take() {
            self.document.remove_marker(previous, HIGHLIGHT_CLASS);
        }
        self.document.detach_listeners();

        if self.state == InspectorState::Enabled {
            info!("Inspector disabled");
        }
        self.state = InspectorState::Disabled;
    }

    pub fn pointer_over(&mut self, target: ElementHandle) {
        if self.state != InspectorState::Enabled {
            return;
        }
        if self.document.element(target).is_none() {
            return;
        }

        if let Some(previous) = self.hovered.take() {
            self.document.remove_marker(previous, HIGHLIGHT_CLASS);
        }
        self.document.add_marker(target, HIGHLIGHT_CLASS);
        self.hovered = Some(target);
    }

    pub fn click(&mut self, target: ElementHandle) -> StudioResult<ClickDisposition> {
        if self.state != InspectorState::Enabled {
            return Ok(ClickDisposition::PassThrough);
        }

        let Some(element) = self.document.element(target) else {
            return Ok(ClickDisposition::PassThrough);
        };

        let scope = match self.scope.as_deref().map(Selector::parse) {
            Some(Ok(parsed)) => Some((parsed, self.scope.clone())),
            Some(Err(e)) => {
                warn!("Ignoring unparseable container scope: {}", e);
                None
            }
            None => None,
        };

        let (selector, scope) = match scope {
            Some((parsed, raw)) => {
                let scoped = selector::synthesize_within(element, &parsed);
                if !scoped.relative {
                    warn!("Picked element lies outside the container; using an absolute selector");
                }
                (scoped.selector, if scoped.relative { raw } else { None })
            }
            None => (selector::synthesize(element), None),
        };

        let value = element.value();
        let event = SelectedElementEvent {
            selector,
            text: element.text().collect::<String>().trim().to_string(),
            tag_name: value.name().to_lowercase(),
            attributes: value
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            scope,
        };

        debug!("Captured click on {}", event.selector);
        self.port.post(&PreviewMessage::ElementSelected(event.clone()))?;
        Ok(ClickDisposition::Captured(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::{self, ControllerInbox};
    use url::Url;

    const PAGE: &str = r#"
        <html><body>
          <form action="/buy"><button type="submit" class="btn primary">Buy</button></form>
          <div id="price-123" class="price"> $19.99 </div>
          <ul><li class="card"><span class="name">A</span></li><li class="card"><span class="name">B</span></li></ul>
        </body></html>"#;

    fn inspector_for(url: &str) -> (Inspector, ControllerInbox) {
        let controller = Url::parse("http://localhost:8000").unwrap();
        let document = PreviewDocument::load(PAGE, Url::parse(url).unwrap(), &controller);
        let (port, inbox) = messenger::channel(document.origin());
        (Inspector::new(document, port), inbox)
    }

    fn handle(inspector: &Inspector, css: &str) -> ElementHandle {
        inspector.document().find(css).unwrap().unwrap()
    }

    #[test]
    fn test_enable_fails_visibly_on_denied_access() {
        let (mut inspector, _inbox) = inspector_for("https://shop.example/products");

        assert!(inspector.enable().is_err());
        assert_eq!(inspector.state(), InspectorState::Disabled);
    }

    #[test]
    fn test_hover_moves_single_marker() {
        let (mut inspector, _inbox) = inspector_for("http://localhost:8000/preview");
        inspector.enable().unwrap();
        let button = handle(&inspector, "button");
        let price = handle(&inspector, "div.price");

        inspector.pointer_over(button);
        inspector.pointer_over(button);
        inspector.pointer_over(price);

        assert_eq!(inspector.document().marked(HIGHLIGHT_CLASS), vec![price]);
    }

    #[test]
    fn test_click_posts_event_and_suppresses_page() {
        let (mut inspector, mut inbox) = inspector_for("http://localhost:8000/preview");
        inspector.enable().unwrap();

        let disposition = inspector.click(handle(&inspector, "div.price")).unwrap();
        let ClickDisposition::Captured(event) = disposition else {
            panic!("click was not captured");
        };

        assert_eq!(event.selector, "div#price-123");
        assert_eq!(event.text, "$19.99");
        assert_eq!(event.tag_name, "div");
        assert_eq!(event.attributes.get("class").map(String::as_str), Some("price"));

        let posted = inbox.try_next().unwrap().unwrap();
        assert_eq!(posted, PreviewMessage::ElementSelected(event));
    }

    #[test]
    fn test_click_passes_through_when_disabled() {
        let (mut inspector, mut inbox) = inspector_for("http://localhost:8000/preview");

        let disposition = inspector.click(handle(&inspector, "button")).unwrap();
        assert_eq!(disposition, ClickDisposition::PassThrough);
        assert!(inbox.try_next().is_none());
    }

    #[test]
    fn test_toggle_twice_leaves_no_marker() {
        let (mut inspector, _inbox) = inspector_for("http://localhost:8000/preview");
        let price = handle(&inspector, "div.price");

        for _ in 0..2 {
            inspector.enable().unwrap();
            inspector.pointer_over(price);
            inspector.disable();
        }

        assert_eq!(inspector.state(), InspectorState::Disabled);
        assert!(inspector.document().marked(HIGHLIGHT_CLASS).is_empty());
        assert!(!inspector.document().listeners_attached());
    }

    #[test]
    fn test_scoped_click_reports_relative_selector() {
        let (mut inspector, _inbox) = inspector_for("http://localhost:8000/preview");
        inspector.enable().unwrap();
        inspector.set_scope(Some("li.card".to_string()));

        let ClickDisposition::Captured(event) = inspector.click(handle(&inspector, "span.name")).unwrap() else {
            panic!("click was not captured");
        };

        assert_eq!(event.selector, "span.name");
        assert_eq!(event.scope.as_deref(), Some("li.card"));
    }
}
