use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

use super::{BaseParameters, ExtractEntry, ExtractionSpec, FieldEntry, QueryType, ScraperConfig};
use crate::config::OutputDefaults;
use crate::error::{StudioError, StudioResult};
use crate::store::{Field, Selection, SelectionKind, SelectionStore};

/// Builds scraper configurations from the selection store
pub struct ConfigAssembler;

impl ConfigAssembler {
    /// Map every saved selection to its `extract` entry
    pub fn extraction_spec(selections: &BTreeMap<String, Selection>) -> ExtractionSpec {
        selections
            .iter()
            .map(|(name, selection)| (name.clone(), Self::entry_for(selection)))
            .collect()
    }

    pub fn entry_for(selection: &Selection) -> ExtractEntry {
        match &selection.kind {
            SelectionKind::Simple => ExtractEntry::Css {
                query: selection.selector.clone(),
                multiple: selection.is_multiple,
                attribute: selection.attribute.clone(),
            },
            SelectionKind::Group { fields } => ExtractEntry::Group {
                container: selection.selector.clone(),
                // A container repeats by definition
                multiple: true,
                attribute: selection.attribute.clone(),
                fields: fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field_entry(field)))
                    .collect(),
            },
        }
    }

    /// Merge the store snapshot with base parameters
    pub fn assemble(store: &SelectionStore, base: BaseParameters) -> ScraperConfig {
        let extract = Self::extraction_spec(store.all());
        info!("Assembled configuration for {} with {} entries", base.url, extract.len());

        ScraperConfig { base, extract }
    }

    /// Download name for a configuration targeting `url`
    pub fn suggested_filename(url: &str) -> String {
        match Url::parse(url).ok().as_ref().and_then(Url::host_str) {
            Some(host) => format!("{}_config.yaml", host.replace('.', "_")),
            None => "scraper_config.yaml".to_string(),
        }
    }
}

fn field_entry(field: &Field) -> FieldEntry {
    FieldEntry {
        query_type: QueryType::Css,
        query: field.selector.clone(),
        multiple: field.is_multiple,
        attribute: field.attribute.clone(),
    }
}

impl BaseParameters {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            render_js: false,
            stealth_mode: true,
            output_format: "json".to_string(),
            output_dir: "output".to_string(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_defaults(url: impl Into<String>, defaults: &OutputDefaults) -> Self {
        Self {
            stealth_mode: defaults.stealth_mode,
            output_format: defaults.output_format.clone(),
            output_dir: defaults.output_dir.clone(),
            ..Self::new(url)
        }
    }

    /// Read base parameters from a full config document, ignoring its `extract` section
    pub fn from_yaml(yaml: &str) -> StudioResult<Self> {
        let mut document: serde_yaml::Mapping = serde_yaml::from_str(yaml)?;
        document.remove(&serde_yaml::Value::from("extract"));

        if !document.contains_key(&serde_yaml::Value::from("url")) {
            return Err(StudioError::generation("generated configuration has no url"));
        }

        Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(document))?)
    }

    /// Guess whether the page needs a JavaScript-capable renderer
    pub fn infer_render_js(html: &str) -> bool {
        static INDICATORS: OnceLock<Option<Regex>> = OnceLock::new();

        let pattern = INDICATORS.get_or_init(|| {
            Regex::new(
                r"(?i)\b(?:vue|react|angular|svelte|jquery)\b|dynamically|lazy|infinite scroll|ajax|axios|fetch\(",
            )
            .ok()
        });

        let needed = pattern.as_ref().is_some_and(|re| re.is_match(html));
        debug!("JavaScript rendering {}", if needed { "required" } else { "not required" });
        needed
    }
}
