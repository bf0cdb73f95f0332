use std::collections::BTreeMap;

use crate::dsl::{ExtractEntry, ExtractionSpec, ScraperConfig};
use crate::error::StudioResult;
use crate::store::{Field, Selection, SelectionStore};

/// Parser for reading configurations back into selections
pub struct ConfigParser;

impl ConfigParser {
    /// Parse config from YAML string
    pub fn parse_yaml(yaml: &str) -> StudioResult<ScraperConfig> {
        ScraperConfig::from_yaml(yaml)
    }

    /// Parse config from JSON string
    pub fn parse_json(json: &str) -> StudioResult<ScraperConfig> {
        ScraperConfig::from_json(json)
    }

    /// Map `extract` entries back to selections
    pub fn to_selections(spec: &ExtractionSpec) -> BTreeMap<String, Selection> {
        spec.iter()
            .map(|(name, entry)| (name.clone(), selection_for(entry)))
            .collect()
    }

    /// Rebuild a store from an existing configuration
    pub fn to_store(config: &ScraperConfig) -> StudioResult<SelectionStore> {
        let mut store = SelectionStore::new();
        for (name, selection) in Self::to_selections(&config.extract) {
            store.add(name, selection)?;
        }
        Ok(store)
    }
}

fn selection_for(entry: &ExtractEntry) -> Selection {
    match entry {
        ExtractEntry::Css { query, multiple, attribute } => {
            Selection::simple(query.clone(), *multiple, attribute.clone())
        }
        ExtractEntry::Group { container, multiple, attribute, fields } => Selection::group(
            container.clone(),
            *multiple,
            attribute.clone(),
            fields
                .iter()
                .map(|(name, field)| {
                    (
                        name.clone(),
                        Field::new(field.query.clone(), field.multiple, field.attribute.clone()),
                    )
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{BaseParameters, ConfigAssembler};

    fn store() -> SelectionStore {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Field::new("h3 > a", false, Some("title".into())));
        fields.insert("price".to_string(), Field::new("p.price_color", false, None));

        let mut store = SelectionStore::new();
        store.add("books", Selection::group("article.product_pod", true, None, fields)).unwrap();
        store.add("heading", Selection::simple("div.page-header > h1", false, None)).unwrap();
        store
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let original = store();
        let yaml = ConfigAssembler::assemble(&original, BaseParameters::new("https://books.example/"))
            .to_yaml()
            .unwrap();

        let parsed = ConfigParser::parse_yaml(&yaml).unwrap();
        let rebuilt = ConfigParser::to_store(&parsed).unwrap();

        assert_eq!(rebuilt.all(), original.all());
    }

    #[test]
    fn test_single_group_comes_back_repeating() {
        let mut store = SelectionStore::new();
        store.add("cards", Selection::group("li.card", false, None, BTreeMap::new())).unwrap();

        let yaml = ConfigAssembler::assemble(&store, BaseParameters::new("https://books.example/"))
            .to_yaml()
            .unwrap();
        let rebuilt = ConfigParser::to_store(&ConfigParser::parse_yaml(&yaml).unwrap()).unwrap();

        assert!(rebuilt.get("cards").unwrap().is_multiple);
    }

    #[test]
    fn test_reserialization_is_byte_identical() {
        let yaml = ConfigAssembler::assemble(&store(), BaseParameters::new("https://books.example/"))
            .to_yaml()
            .unwrap();

        let again = ConfigParser::parse_yaml(&yaml).unwrap().to_yaml().unwrap();
        assert_eq!(again, yaml);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"url":"https://a.example","extract":{"t":{"type":"css","query":"h1","multiple":false}}}"#;
        let config = ConfigParser::parse_json(json).unwrap();
        let selections = ConfigParser::to_selections(&config.extract);

        assert_eq!(selections["t"], Selection::simple("h1", false, None));
    }
}
