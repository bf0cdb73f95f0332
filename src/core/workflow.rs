use std::collections::BTreeMap;

use crate::error::{StudioError, StudioResult};
use crate::messenger::SelectedElementEvent;
use crate::store::{Field, Selection};

/// Group that receives the field being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParent {
    /// The selection form currently open
    Draft,
    /// A group already in the store
    Saved(String),
}

/// Which pending workflow consumes the next picked element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowMode {
    Idle,
    BuildingTopLevelSelection,
    BuildingGroupField(FieldParent),
}

/// Last element picked for a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedElement {
    pub text: String,
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
}

impl PickedElement {
    fn from_event(event: &SelectedElementEvent) -> Self {
        Self {
            text: event.text.clone(),
            tag_name: event.tag_name.clone(),
            attributes: event.attributes.clone(),
        }
    }

    /// Attribute most likely wanted for this kind of element
    pub fn suggested_attribute(&self) -> Option<&'static str> {
        let candidate = match self.tag_name.as_str() {
            "a" | "link" => "href",
            "img" | "source" | "video" | "audio" | "iframe" => "src",
            "time" => "datetime",
            _ => return None,
        };
        self.attributes.contains_key(candidate).then_some(candidate)
    }
}

/// Pending add-selection form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionForm {
    pub name: String,
    pub selector: String,
    pub is_group: bool,
    pub is_multiple: bool,
    pub attribute: String,
    pub fields: BTreeMap<String, Field>,
    pub picked: Option<PickedElement>,
}

impl SelectionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the selector input from a picked element
    pub fn apply_event(&mut self, event: &SelectedElementEvent) {
        self.selector = event.selector.clone();
        self.picked = Some(PickedElement::from_event(event));
    }

    /// Add a field to the draft group; names are unique within the group
    pub fn add_field(&mut self, name: &str, field: Field) -> StudioResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::incomplete_form("field name"));
        }
        if self.fields.contains_key(name) {
            return Err(StudioError::duplicate_name(name));
        }
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Validate the form and build the selection to save
    pub fn to_selection(&self) -> StudioResult<(String, Selection)> {
        let name = self.name.trim();
        let selector = self.selector.trim();

        let missing: Vec<&str> = [("name", name), ("selector", selector)]
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(label, _)| label)
            .collect();
        if !missing.is_empty() {
            return Err(StudioError::incomplete_form(missing.join(", ")));
        }

        let attribute = Some(self.attribute.clone());
        let selection = if self.is_group {
            Selection::group(selector, self.is_multiple, attribute, self.fields.clone())
        } else {
            Selection::simple(selector, self.is_multiple, attribute)
        };

        Ok((name.to_string(), selection))
    }
}

/// Pending add-field form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldForm {
    pub name: String,
    pub selector: String,
    pub is_multiple: bool,
    pub attribute: String,
    pub picked: Option<PickedElement>,
}

impl FieldForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_event(&mut self, event: &SelectedElementEvent) {
        self.selector = event.selector.clone();
        self.picked = Some(PickedElement::from_event(event));
    }

    pub fn to_field(&self) -> StudioResult<(String, Field)> {
        let name = self.name.trim();
        let selector = self.selector.trim();
        if name.is_empty() || selector.is_empty() {
            let missing = if name.is_empty() { "field name" } else { "field selector" };
            return Err(StudioError::incomplete_form(missing));
        }

        Ok((
            name.to_string(),
            Field::new(selector, self.is_multiple, Some(self.attribute.clone())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(selector: &str, tag: &str, attributes: &[(&str, &str)]) -> SelectedElementEvent {
        SelectedElementEvent {
            selector: selector.to_string(),
            text: "Read more".to_string(),
            tag_name: tag.to_string(),
            attributes: attributes.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            scope: None,
        }
    }

    #[test]
    fn test_incomplete_selection_form() {
        let form = SelectionForm::new();
        let err = form.to_selection().unwrap_err();

        assert_eq!(err, StudioError::incomplete_form("name, selector"));
    }

    #[test]
    fn test_selection_form_builds_group() {
        let mut form = SelectionForm::new();
        form.apply_event(&event("li.card", "li", &[("class", "card")]));
        form.name = " products ".to_string();
        form.is_group = true;
        form.is_multiple = true;
        form.add_field("name", Field::new("span.name", false, None)).unwrap();
        assert!(form.add_field("name", Field::new("b", false, None)).is_err());

        let (name, selection) = form.to_selection().unwrap();
        assert_eq!(name, "products");
        assert!(selection.is_group());
        assert_eq!(selection.fields().unwrap().len(), 1);
        assert_eq!(selection.attribute, None);
    }

    #[test]
    fn test_field_form() {
        let mut form = FieldForm::new();
        form.apply_event(&event("a", "a", &[("href", "/item/1")]));
        form.name = "link".to_string();
        form.attribute = "href".to_string();

        let (name, field) = form.to_field().unwrap();
        assert_eq!(name, "link");
        assert_eq!(field.attribute.as_deref(), Some("href"));
        assert_eq!(form.picked.as_ref().and_then(|p| p.suggested_attribute()), Some("href"));
    }

    #[test]
    fn test_no_suggestion_without_attribute() {
        let mut form = FieldForm::new();
        form.apply_event(&event("img", "img", &[("alt", "x")]));
        assert_eq!(form.picked.unwrap().suggested_attribute(), None);
    }
}
