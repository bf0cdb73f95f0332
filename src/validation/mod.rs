use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

pub mod document;

pub use document::DocumentValidator;

use crate::dsl::{BaseParameters, ConfigAssembler};
use crate::error::{StudioError, StudioResult};
use crate::service::ConfigService;
use crate::store::{Selection, SelectionStore};

const PASS: &str = "✅";
const FAIL: &str = "❌";

/// Outcome of a flat selector or of one group field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleResult {
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_sample: Option<String>,
}

impl SimpleResult {
    pub fn failed() -> Self {
        Self {
            success: false,
            count: 0,
            sample: None,
            attribute_present: None,
            attribute_sample: None,
        }
    }
}

/// Outcome of a group container and its fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    pub container: bool,
    #[serde(default)]
    pub container_count: usize,
    #[serde(default)]
    pub fields: BTreeMap<String, SimpleResult>,
}

impl GroupResult {
    pub fn missing() -> Self {
        Self {
            container: false,
            container_count: 0,
            fields: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationResult {
    Group(GroupResult),
    Simple(SimpleResult),
}

impl ValidationResult {
    /// A group passes only when its container and every field matched
    pub fn passed(&self) -> bool {
        match self {
            Self::Group(group) => group.container && group.fields.values().all(|field| field.success),
            Self::Simple(simple) => simple.success,
        }
    }
}

/// One decoded entry of a validation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    Result(ValidationResult),
    /// The service sent something that does not fit the expected shape
    Malformed { reason: String },
}

/// Decoded validation response, keyed by selection name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub entries: BTreeMap<String, ReportEntry>,
}

impl ValidationReport {
    /// Decode a raw response. Each entry's shape follows the saved selection of the
    /// same name; names not in the store are decoded by presence of `container`.
    pub fn from_response(
        response: &serde_json::Value,
        selections: &BTreeMap<String, Selection>,
    ) -> StudioResult<Self> {
        let object = response
            .as_object()
            .ok_or_else(|| StudioError::validation("validation response is not an object"))?;

        let entries = object
            .iter()
            .map(|(name, raw)| {
                let expect_group = match selections.get(name) {
                    Some(selection) => selection.is_group(),
                    None => raw.get("container").is_some(),
                };
                (name.clone(), decode_entry(name, raw, expect_group))
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn from_results(results: BTreeMap<String, ValidationResult>) -> Self {
        Self {
            entries: results
                .into_iter()
                .map(|(name, result)| (name, ReportEntry::Result(result)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ValidationResult> {
        match self.entries.get(name) {
            Some(ReportEntry::Result(result)) => Some(result),
            _ => None,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.entries.values().all(|entry| match entry {
            ReportEntry::Result(result) => result.passed(),
            ReportEntry::Malformed { .. } => false,
        })
    }

    /// Plain-text rendering, one block per entry
    pub fn to_text(&self) -> String {
        if self.entries.is_empty() {
            return "No validation results".to_string();
        }

        let mut out = String::new();
        for (name, entry) in &self.entries {
            match entry {
                ReportEntry::Result(ValidationResult::Group(group)) => {
                    let _ = writeln!(out, "{} {}", name, icon(group.container));
                    let _ = writeln!(out, "  Container: {} matches", group.container_count);
                    for (field_name, field) in &group.fields {
                        let _ = writeln!(out, "  {}", simple_line(field_name, field));
                        write_attribute_text(&mut out, field, "    ");
                    }
                }
                ReportEntry::Result(ValidationResult::Simple(simple)) => {
                    let _ = writeln!(out, "{}", simple_line(name, simple));
                    write_attribute_text(&mut out, simple, "  ");
                }
                ReportEntry::Malformed { reason } => {
                    let _ = writeln!(out, "{} {} ({})", name, FAIL, reason);
                }
            }
        }
        out
    }

    /// HTML fragment for the results panel; names, samples and reasons are escaped
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"list-group\">");

        for (name, entry) in &self.entries {
            html.push_str("<div class=\"list-group-item\">");
            match entry {
                ReportEntry::Result(ValidationResult::Group(group)) => {
                    let _ = write!(
                        html,
                        "<div class=\"{}\"><strong>{}</strong> {}</div><div>Container: {} matches</div>",
                        css_class(group.container),
                        html_escape::encode_text(name),
                        icon(group.container),
                        group.container_count
                    );
                    if !group.fields.is_empty() {
                        html.push_str("<div>Fields:</div><ul class=\"list-unstyled\">");
                        for (field_name, field) in &group.fields {
                            let _ = write!(
                                html,
                                "<li class=\"{}\">{}</li>",
                                css_class(field.success),
                                simple_html(field_name, field)
                            );
                        }
                        html.push_str("</ul>");
                    }
                }
                ReportEntry::Result(ValidationResult::Simple(simple)) => {
                    let _ = write!(
                        html,
                        "<div class=\"{}\">{}</div>",
                        css_class(simple.success),
                        simple_html(name, simple)
                    );
                }
                ReportEntry::Malformed { reason } => {
                    let _ = write!(
                        html,
                        "<div class=\"validation-failure\"><strong>{}</strong> {} {}</div>",
                        html_escape::encode_text(name),
                        FAIL,
                        html_escape::encode_text(reason)
                    );
                }
            }
            html.push_str("</div>");
        }

        html.push_str("</div>");
        html
    }
}

fn decode_entry(name: &str, raw: &serde_json::Value, expect_group: bool) -> ReportEntry {
    let decoded = if expect_group {
        serde_json::from_value::<GroupResult>(raw.clone()).map(ValidationResult::Group)
    } else {
        serde_json::from_value::<SimpleResult>(raw.clone()).map(ValidationResult::Simple)
    };

    match decoded {
        Ok(result) => ReportEntry::Result(result),
        Err(e) => {
            warn!("Malformed validation entry '{}': {}", name, e);
            ReportEntry::Malformed { reason: e.to_string() }
        }
    }
}

fn icon(success: bool) -> &'static str {
    if success {
        PASS
    } else {
        FAIL
    }
}

fn css_class(success: bool) -> &'static str {
    if success {
        "validation-success"
    } else {
        "validation-failure"
    }
}

fn simple_line(name: &str, result: &SimpleResult) -> String {
    let mut line = format!("{} {}", name, icon(result.success));
    if result.count > 0 {
        let _ = write!(line, " ({} matches)", result.count);
    }
    if let Some(sample) = result.sample.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(line, " \"{}\"", sample);
    }
    line
}

fn write_attribute_text(out: &mut String, result: &SimpleResult, indent: &str) {
    if let Some(present) = result.attribute_present {
        let _ = write!(out, "{}Attribute {}", indent, icon(present));
        if let Some(sample) = &result.attribute_sample {
            let _ = write!(out, " \"{}\"", sample);
        }
        out.push('\n');
    }
}

fn simple_html(name: &str, result: &SimpleResult) -> String {
    let mut html = format!("<strong>{}</strong> {}", html_escape::encode_text(name), icon(result.success));
    if result.count > 0 {
        let _ = write!(html, " ({} matches)", result.count);
    }
    if let Some(sample) = result.sample.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(
            html,
            " <span class=\"selector-sample\">\"{}\"</span>",
            html_escape::encode_text(sample)
        );
    }
    if let Some(present) = result.attribute_present {
        let _ = write!(html, "<div class=\"{}\">Attribute {}", css_class(present), icon(present));
        if let Some(sample) = &result.attribute_sample {
            let _ = write!(
                html,
                " <span class=\"selector-sample\">\"{}\"</span>",
                html_escape::encode_text(sample)
            );
        }
        html.push_str("</div>");
    }
    html
}

/// Runs selector validation through the config service
pub struct ValidationClient {
    service: Arc<dyn ConfigService>,
}

impl ValidationClient {
    pub fn new(service: Arc<dyn ConfigService>) -> Self {
        Self { service }
    }

    /// Assemble the current store into a config and validate it against `url`
    pub async fn validate(
        &self,
        url: &str,
        store: &SelectionStore,
        base: BaseParameters,
    ) -> StudioResult<ValidationReport> {
        let config = ConfigAssembler::assemble(store, base);

        let response = self
            .service
            .validate_selectors(url, &config)
            .await
            .map_err(|e| match e {
                StudioError::Validation { .. } => e,
                other => StudioError::validation(other.to_string()),
            })?;

        let report = ValidationReport::from_response(&response, store.all())?;
        info!("Validated {} selectors for {}", report.entries.len(), url);
        Ok(report)
    }
}
