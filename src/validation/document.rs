use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{GroupResult, SimpleResult, ValidationResult};
use crate::dsl::{ExtractEntry, ExtractionSpec, FieldEntry};

/// Evaluates an extraction spec against one loaded document
pub struct DocumentValidator {
    html: Html,
}

impl DocumentValidator {
    pub fn new(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn from_document(html: Html) -> Self {
        Self { html }
    }

    pub fn validate(&self, spec: &ExtractionSpec) -> BTreeMap<String, ValidationResult> {
        let results: BTreeMap<_, _> = spec
            .iter()
            .map(|(name, entry)| (name.clone(), self.validate_entry(entry)))
            .collect();

        debug!("Validated {} entries against document", results.len());
        results
    }

    /// Same as `validate`, in the JSON shape the validation service returns
    pub fn validate_json(&self, spec: &ExtractionSpec) -> serde_json::Value {
        serde_json::to_value(self.validate(spec)).unwrap_or_default()
    }

    pub fn validate_entry(&self, entry: &ExtractEntry) -> ValidationResult {
        match entry {
            ExtractEntry::Css { query, attribute, .. } => {
                let Some(selector) = parse(query) else {
                    return ValidationResult::Simple(SimpleResult::failed());
                };
                let matches: Vec<ElementRef<'_>> = self.html.select(&selector).collect();
                ValidationResult::Simple(summarize(&matches, attribute.as_deref()))
            }
            ExtractEntry::Group { container, fields, .. } => {
                let Some(selector) = parse(container) else {
                    return ValidationResult::Group(GroupResult::missing());
                };
                let containers: Vec<ElementRef<'_>> = self.html.select(&selector).collect();
                if containers.is_empty() {
                    return ValidationResult::Group(GroupResult::missing());
                }

                ValidationResult::Group(GroupResult {
                    container: true,
                    container_count: containers.len(),
                    fields: fields
                        .iter()
                        .map(|(name, field)| (name.clone(), validate_field(&containers, field)))
                        .collect(),
                })
            }
        }
    }
}

/// Field matches summed over every container instance
fn validate_field(containers: &[ElementRef<'_>], field: &FieldEntry) -> SimpleResult {
    let Some(selector) = parse(&field.query) else {
        return SimpleResult::failed();
    };

    let matches: Vec<ElementRef<'_>> = containers
        .iter()
        .flat_map(|container| container.select(&selector))
        .collect();

    summarize(&matches, field.attribute.as_deref())
}

fn summarize(matches: &[ElementRef<'_>], attribute: Option<&str>) -> SimpleResult {
    let first = matches.first();

    // Empty text still yields a sample; only a missing match yields none
    let sample = first.map(|element| element.text().collect::<String>().trim().to_string());

    let (attribute_present, attribute_sample) = match (attribute, first) {
        (Some(name), Some(element)) => {
            let value = element.value().attr(name);
            (Some(value.is_some()), value.map(str::to_string))
        }
        _ => (None, None),
    };

    SimpleResult {
        success: !matches.is_empty(),
        count: matches.len(),
        sample,
        attribute_present,
        attribute_sample,
    }
}

fn parse(query: &str) -> Option<Selector> {
    match Selector::parse(query) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Cannot evaluate selector '{}': {}", query, e);
            None
        }
    }
}
