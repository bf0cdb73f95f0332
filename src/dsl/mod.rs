use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod assembler;
pub mod parser;

pub use assembler::ConfigAssembler;
pub use parser::ConfigParser;

use crate::error::StudioResult;

/// Query language of an extraction entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    #[default]
    #[serde(rename = "css")]
    Css,
}

/// Field of a group entry, evaluated inside each container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    #[serde(rename = "type", default)]
    pub query_type: QueryType,
    pub query: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// One named entry of the `extract` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractEntry {
    #[serde(rename = "css")]
    Css {
        query: String,
        #[serde(default)]
        multiple: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
    },
    #[serde(rename = "group")]
    Group {
        container: String,
        #[serde(default)]
        multiple: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        #[serde(default)]
        fields: BTreeMap<String, FieldEntry>,
    },
}

impl ExtractEntry {
    /// Selector evaluated against the whole document
    pub fn root_query(&self) -> &str {
        match self {
            Self::Css { query, .. } => query,
            Self::Group { container, .. } => container,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

/// Name -> entry mapping consumed by the scraping engine
pub type ExtractionSpec = BTreeMap<String, ExtractEntry>;

/// Scraping parameters that sit next to `extract` in the config document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseParameters {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub render_js: bool,
    #[serde(default = "default_stealth_mode")]
    pub stealth_mode: bool,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Keys owned by the scraping engine that are passed through untouched
    #[serde(flatten)]
    pub extras: BTreeMap<String, serde_yaml::Value>,
}

fn default_stealth_mode() -> bool {
    true
}

fn default_output_format() -> String {
    "json".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// Portable scraper configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(flatten)]
    pub base: BaseParameters,
    #[serde(default)]
    pub extract: ExtractionSpec,
}

impl ScraperConfig {
    /// Create a new config from YAML string
    pub fn from_yaml(yaml: &str) -> StudioResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Convert config to YAML string
    pub fn to_yaml(&self) -> StudioResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(json: &str) -> StudioResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> StudioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn url(&self) -> &str {
        &self.base.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
url: https://shop.example/products
headers:
  User-Agent: Mozilla/5.0
render_js: false
stealth_mode: true
output_format: json
output_dir: output
max_pages: 3
extract:
  price:
    type: css
    query: div#price-123
    multiple: false
  products:
    type: group
    container: li.card
    multiple: true
    fields:
      name:
        type: css
        query: span.name
        multiple: false
      link:
        type: css
        query: a
        multiple: false
        attribute: href
"#;

    #[test]
    fn test_parse_engine_format() {
        let config = ScraperConfig::from_yaml(CONFIG).unwrap();

        assert_eq!(config.url(), "https://shop.example/products");
        assert_eq!(config.base.headers["User-Agent"], "Mozilla/5.0");
        assert_eq!(config.base.extras["max_pages"].as_u64(), Some(3));
        assert!(!config.base.extras.contains_key("extract"));

        match &config.extract["products"] {
            ExtractEntry::Group { container, fields, .. } => {
                assert_eq!(container, "li.card");
                assert_eq!(fields["link"].attribute.as_deref(), Some("href"));
            }
            other => panic!("expected group, got {:?}", other),
        }
        assert_eq!(config.extract["price"].root_query(), "div#price-123");
    }

    #[test]
    fn test_defaults_applied() {
        let config = ScraperConfig::from_yaml("url: https://a.example\n").unwrap();

        assert!(config.base.stealth_mode);
        assert_eq!(config.base.output_format, "json");
        assert_eq!(config.base.output_dir, "output");
        assert!(config.extract.is_empty());
    }

    #[test]
    fn test_unknown_entry_type_rejected() {
        let yaml = "url: https://a.example\nextract:\n  x:\n    type: xpath\n    query: //a\n";
        assert!(ScraperConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_json_output_carries_types() {
        let config = ScraperConfig::from_yaml(CONFIG).unwrap();
        let json: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        assert_eq!(json["extract"]["price"]["type"], "css");
        assert_eq!(json["extract"]["products"]["type"], "group");
        assert_eq!(json["extract"]["products"]["fields"]["name"]["type"], "css");
        assert!(json["extract"]["price"].get("attribute").is_none());
    }
}
