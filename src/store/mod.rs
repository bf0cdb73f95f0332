use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub mod view;

pub use view::SelectionListView;

use crate::error::{StudioError, StudioResult};

/// A field inside a group selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub selector: String,
    #[serde(default)]
    pub is_multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Field {
    pub fn new(selector: impl Into<String>, is_multiple: bool, attribute: Option<String>) -> Self {
        Self {
            selector: selector.into(),
            is_multiple,
            attribute: normalize_attribute(attribute),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionKind {
    Simple,
    Group { fields: BTreeMap<String, Field> },
}

/// A named, saved selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SelectionWire", try_from = "SelectionWire")]
pub struct Selection {
    pub selector: String,
    pub is_multiple: bool,
    pub attribute: Option<String>,
    pub kind: SelectionKind,
}

impl Selection {
    pub fn simple(selector: impl Into<String>, is_multiple: bool, attribute: Option<String>) -> Self {
        Self {
            selector: selector.into(),
            is_multiple,
            attribute: normalize_attribute(attribute),
            kind: SelectionKind::Simple,
        }
    }

    pub fn group(
        selector: impl Into<String>,
        is_multiple: bool,
        attribute: Option<String>,
        fields: BTreeMap<String, Field>,
    ) -> Self {
        Self {
            selector: selector.into(),
            is_multiple,
            attribute: normalize_attribute(attribute),
            kind: SelectionKind::Group { fields },
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, SelectionKind::Group { .. })
    }

    /// Group fields; `None` for simple selections
    pub fn fields(&self) -> Option<&BTreeMap<String, Field>> {
        match &self.kind {
            SelectionKind::Group { fields } => Some(fields),
            SelectionKind::Simple => None,
        }
    }
}

/// Selection as exchanged with the config service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionWire {
    selector: String,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    is_multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, Field>>,
}

impl From<Selection> for SelectionWire {
    fn from(selection: Selection) -> Self {
        let (is_group, fields) = match selection.kind {
            SelectionKind::Simple => (false, None),
            SelectionKind::Group { fields } => (true, Some(fields)),
        };

        Self {
            selector: selection.selector,
            is_group,
            is_multiple: selection.is_multiple,
            attribute: selection.attribute,
            fields,
        }
    }
}

impl TryFrom<SelectionWire> for Selection {
    type Error = StudioError;

    fn try_from(wire: SelectionWire) -> Result<Self, Self::Error> {
        let kind = match (wire.is_group, wire.fields) {
            (true, fields) => SelectionKind::Group { fields: fields.unwrap_or_default() },
            (false, None) => SelectionKind::Simple,
            (false, Some(_)) => {
                return Err(StudioError::serialization(format!(
                    "selection '{}' has fields but is not a group",
                    wire.selector
                )))
            }
        };

        Ok(Self {
            selector: wire.selector,
            is_multiple: wire.is_multiple,
            attribute: normalize_attribute(wire.attribute),
            kind,
        })
    }
}

fn normalize_attribute(attribute: Option<String>) -> Option<String> {
    attribute
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Named mapping of saved selections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    selections: BTreeMap<String, Selection>,
    revision: u64,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new selection. Existing names are never overwritten.
    pub fn add(&mut self, name: impl Into<String>, selection: Selection) -> StudioResult<()> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(StudioError::incomplete_form("name"));
        }
        if selection.selector.trim().is_empty() {
            return Err(StudioError::incomplete_form("selector"));
        }
        if self.selections.contains_key(&name) {
            return Err(StudioError::duplicate_name(name));
        }

        debug!("Saving selection '{}' -> {}", name, selection.selector);
        self.selections.insert(name, selection);
        self.revision += 1;
        Ok(())
    }

    /// Remove a selection; removing a missing name is a no-op
    pub fn remove(&mut self, name: &str) -> Option<Selection> {
        let removed = self.selections.remove(name);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Add a field to a saved group
    pub fn add_field(&mut self, parent: &str, name: impl Into<String>, field: Field) -> StudioResult<()> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(StudioError::incomplete_form("field name"));
        }
        if field.selector.trim().is_empty() {
            return Err(StudioError::incomplete_form("field selector"));
        }

        let selection = self
            .selections
            .get_mut(parent)
            .ok_or_else(|| StudioError::not_found(parent))?;

        let SelectionKind::Group { fields } = &mut selection.kind else {
            return Err(StudioError::invalid_state(format!("'{}' is not a group", parent)));
        };

        if fields.contains_key(&name) {
            return Err(StudioError::duplicate_name(name));
        }

        fields.insert(name, field);
        self.revision += 1;
        Ok(())
    }

    pub fn remove_field(&mut self, parent: &str, name: &str) -> Option<Field> {
        let removed = match self.selections.get_mut(parent).map(|s| &mut s.kind) {
            Some(SelectionKind::Group { fields }) => fields.remove(name),
            _ => None,
        };
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn all(&self) -> &BTreeMap<String, Selection> {
        &self.selections
    }

    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.selections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selections.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Incremented on every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards() -> Selection {
        let fields = [("name".to_string(), Field::new(".name", false, None))]
            .into_iter()
            .collect();
        Selection::group("li.card", true, None, fields)
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut store = SelectionStore::new();
        store.add("price", Selection::simple("div#price-123", false, None)).unwrap();

        let err = store
            .add("price", Selection::simple("span.other", true, None))
            .unwrap_err();

        assert_eq!(err, StudioError::duplicate_name("price"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("price").unwrap().selector, "div#price-123");
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_blank_name_is_incomplete() {
        let mut store = SelectionStore::new();
        let err = store.add("   ", Selection::simple("a", false, None)).unwrap_err();

        assert!(matches!(err, StudioError::IncompleteForm { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = SelectionStore::new();
        store.add("cards", cards()).unwrap();

        assert!(store.remove("cards").is_some());
        assert!(store.remove("cards").is_none());
        assert!(store.is_empty());
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_fields_on_saved_group() {
        let mut store = SelectionStore::new();
        store.add("cards", cards()).unwrap();
        store.add("title", Selection::simple("h1", false, None)).unwrap();

        store.add_field("cards", "link", Field::new("a", false, Some("href".into()))).unwrap();
        assert!(matches!(
            store.add_field("cards", "link", Field::new("a.other", false, None)),
            Err(StudioError::DuplicateName { .. })
        ));
        assert!(matches!(
            store.add_field("title", "x", Field::new("b", false, None)),
            Err(StudioError::InvalidState { .. })
        ));
        assert!(matches!(
            store.add_field("missing", "x", Field::new("b", false, None)),
            Err(StudioError::NotFound { .. })
        ));

        let fields = store.get("cards").unwrap().fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["link"].attribute.as_deref(), Some("href"));

        assert!(store.remove_field("cards", "link").is_some());
        assert!(store.remove_field("cards", "link").is_none());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(cards()).unwrap();
        assert_eq!(json["isGroup"], true);
        assert_eq!(json["isMultiple"], true);
        assert_eq!(json["fields"]["name"]["selector"], ".name");
        assert!(json.get("attribute").is_none());

        let simple = serde_json::to_value(Selection::simple("img", false, Some("src".into()))).unwrap();
        assert_eq!(simple["isGroup"], false);
        assert_eq!(simple["attribute"], "src");
        assert!(simple.get("fields").is_none());
    }

    #[test]
    fn test_fields_on_simple_selection_rejected() {
        let json = r#"{"selector":"a","isGroup":false,"isMultiple":false,"fields":{}}"#;
        assert!(serde_json::from_str::<Selection>(json).is_err());
    }

    #[test]
    fn test_blank_attribute_is_dropped() {
        let selection = Selection::simple("a", false, Some("  ".into()));
        assert_eq!(selection.attribute, None);
    }
}
