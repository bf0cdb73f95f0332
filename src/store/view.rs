use std::fmt::Write as _;

use super::{Field, Selection, SelectionStore};

/// Rendered row of the selection list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRow {
    pub name: String,
    pub selector: String,
    pub summary: String,
    pub fields: Vec<FieldRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub name: String,
    pub selector: String,
    pub summary: String,
}

/// Snapshot of the store as shown in the selection list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionListView {
    pub rows: Vec<SelectionRow>,
    /// Store revision this view was rendered from
    pub revision: u64,
}

impl SelectionListView {
    pub fn render(store: &SelectionStore) -> Self {
        let rows = store
            .all()
            .iter()
            .map(|(name, selection)| SelectionRow {
                name: name.clone(),
                selector: selection.selector.clone(),
                summary: selection_summary(selection),
                fields: selection
                    .fields()
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(field_name, field)| FieldRow {
                                name: field_name.clone(),
                                selector: field.selector.clone(),
                                summary: field_summary(field),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            rows,
            revision: store.revision(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "No selections yet".to_string();
        }

        let mut out = String::new();
        for row in &self.rows {
            let _ = writeln!(out, "{}: {}", row.name, row.selector);
            let _ = writeln!(out, "  {}", row.summary);
            for field in &row.fields {
                let _ = writeln!(out, "    {}: {}", field.name, field.selector);
                let _ = writeln!(out, "      {}", field.summary);
            }
        }
        out
    }

    /// HTML fragment for the list panel; all user-provided text is escaped
    pub fn to_html(&self) -> String {
        if self.rows.is_empty() {
            return "<p class=\"text-muted\">No selections yet</p>".to_string();
        }

        let mut html = String::new();
        for row in &self.rows {
            html.push_str("<div class=\"selection-item\">");
            let _ = write!(
                html,
                "<div><strong>{}</strong>: {}<button data-selection=\"{}\">Remove</button></div>",
                html_escape::encode_text(&row.name),
                html_escape::encode_text(&row.selector),
                html_escape::encode_double_quoted_attribute(&row.name),
            );
            let _ = write!(html, "<div class=\"small\">{}</div>", html_escape::encode_text(&row.summary));

            if !row.fields.is_empty() {
                html.push_str("<div class=\"group-fields-container\">");
                for field in &row.fields {
                    let _ = write!(
                        html,
                        "<div><strong>{}:</strong> {}<div class=\"small\">{}</div></div>",
                        html_escape::encode_text(&field.name),
                        html_escape::encode_text(&field.selector),
                        html_escape::encode_text(&field.summary),
                    );
                }
                html.push_str("</div>");
            }
            html.push_str("</div>");
        }
        html
    }
}

fn selection_summary(selection: &Selection) -> String {
    let mut parts = Vec::new();
    if let Some(attribute) = &selection.attribute {
        parts.push(format!("Attribute: {}", attribute));
    }
    if selection.is_multiple {
        parts.push("Multiple elements".to_string());
    }
    parts.push(if selection.is_group() { "Group container" } else { "Simple selector" }.to_string());
    parts.join(" | ")
}

fn field_summary(field: &Field) -> String {
    let multiplicity = if field.is_multiple { "Multiple elements" } else { "Single element" };
    match &field.attribute {
        Some(attribute) => format!("Attribute: {} | {}", attribute, multiplicity),
        None => multiplicity.to_string(),
    }
}
