use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use crate::error::{StudioError, StudioResult};

/// Marker class applied to the hovered element
pub const HIGHLIGHT_CLASS: &str = "highlight-element";

/// Stable handle to an element of a preview document (document-order index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementHandle(usize);

impl ElementHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Whether the controller may script the preview context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewAccess {
    Scriptable,
    Denied { reason: String },
}

/// A page loaded into the preview surface.
///
/// Page content is immutable; presentation markers live in an overlay keyed by
/// element handle.
pub struct PreviewDocument {
    html: Html,
    url: Url,
    access: PreviewAccess,
    markers: BTreeSet<(ElementHandle, &'static str)>,
    listeners_attached: bool,
}

impl PreviewDocument {
    /// Load a page served from `url` into a controller running under `controller_origin`.
    pub fn load(html: &str, url: Url, controller_origin: &Url) -> Self {
        let access = if url.origin() == controller_origin.origin() {
            PreviewAccess::Scriptable
        } else {
            PreviewAccess::Denied {
                reason: format!(
                    "preview origin {} differs from {}",
                    url.origin().ascii_serialization(),
                    controller_origin.origin().ascii_serialization()
                ),
            }
        };

        debug!("Loaded preview document from {} ({:?})", url, access);

        Self {
            html: Html::parse_document(html),
            url,
            access,
            markers: BTreeSet::new(),
            listeners_attached: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Serialized origin used as the sender origin of posted messages
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn access(&self) -> &PreviewAccess {
        &self.access
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// Resolve a handle to its element
    pub fn element(&self, handle: ElementHandle) -> Option<ElementRef<'_>> {
        self.elements().nth(handle.0)
    }

    /// Handle of an element belonging to this document
    pub fn handle_of(&self, element: ElementRef<'_>) -> Option<ElementHandle> {
        self.elements()
            .position(|candidate| candidate == element)
            .map(ElementHandle)
    }

    /// First element matching a CSS selector
    pub fn find(&self, css: &str) -> StudioResult<Option<ElementHandle>> {
        let selector = Selector::parse(css).map_err(|e| StudioError::InvalidSelector {
            selector: css.to_string(),
            reason: e.to_string(),
        })?;

        Ok(self
            .html
            .select(&selector)
            .next()
            .and_then(|element| self.handle_of(element)))
    }

    /// Attach capture-phase listeners; fails when the context cannot be scripted.
    pub(crate) fn attach_listeners(&mut self) -> StudioResult<()> {
        match &self.access {
            PreviewAccess::Scriptable => {
                self.listeners_attached = true;
                Ok(())
            }
            PreviewAccess::Denied { reason } => Err(StudioError::preview_access(format!(
                "{}; load the page through the proxied preview instead",
                reason
            ))),
        }
    }

    pub(crate) fn detach_listeners(&mut self) {
        self.listeners_attached = false;
    }

    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached
    }

    pub(crate) fn add_marker(&mut self, handle: ElementHandle, class: &'static str) {
        self.markers.insert((handle, class));
    }

    pub(crate) fn remove_marker(&mut self, handle: ElementHandle, class: &'static str) {
        self.markers.remove(&(handle, class));
    }

    pub fn has_marker(&self, handle: ElementHandle, class: &str) -> bool {
        self.markers.iter().any(|(h, c)| *h == handle && *c == class)
    }

    /// Elements currently carrying `class`
    pub fn marked(&self, class: &str) -> Vec<ElementHandle> {
        self.markers
            .iter()
            .filter(|(_, c)| *c == class)
            .map(|(h, _)| *h)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><p class="lead">Hello</p><a href="/x">x</a></body></html>"#;

    fn origin() -> Url {
        Url::parse("http://localhost:8000/").unwrap()
    }

    #[test]
    fn test_same_origin_preview_is_scriptable() {
        let url = Url::parse("http://localhost:8000/preview?url=https%3A%2F%2Fshop.example").unwrap();
        let mut document = PreviewDocument::load(PAGE, url, &origin());

        assert_eq!(document.access(), &PreviewAccess::Scriptable);
        assert!(document.attach_listeners().is_ok());
        assert!(document.listeners_attached());
    }

    #[test]
    fn test_foreign_origin_is_denied() {
        let url = Url::parse("https://shop.example/").unwrap();
        let mut document = PreviewDocument::load(PAGE, url, &origin());

        let err = document.attach_listeners().unwrap_err();
        assert_eq!(err.category(), "preview");
        assert!(!document.listeners_attached());
    }

    #[test]
    fn test_handles_round_trip() {
        let document = PreviewDocument::load(PAGE, origin(), &origin());
        let handle = document.find("a").unwrap().unwrap();
        let element = document.element(handle).unwrap();

        assert_eq!(element.value().attr("href"), Some("/x"));
        assert_eq!(document.handle_of(element), Some(handle));
    }

    #[test]
    fn test_markers_do_not_touch_content() {
        let mut document = PreviewDocument::load(PAGE, origin(), &origin());
        let handle = document.find("p.lead").unwrap().unwrap();

        document.add_marker(handle, HIGHLIGHT_CLASS);
        assert!(document.has_marker(handle, HIGHLIGHT_CLASS));
        assert_eq!(document.element(handle).unwrap().value().attr("class"), Some("lead"));

        document.remove_marker(handle, HIGHLIGHT_CLASS);
        assert!(document.marked(HIGHLIGHT_CLASS).is_empty());
    }
}
