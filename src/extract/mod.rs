//! Structured data extraction
//!
//! An `Extractor` holds a list of field specifications and turns an HTML
//! document into `ExtractedRecord`s. Parsing is best effort: malformed
//! markup still yields a tree, and only a missing required field (or an
//! unreadable required number) fails a record.

mod selector;

pub use selector::SelectorKind;

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExtractConfig;

/// Errors raised while building an extractor or extracting a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' is not a number: '{text}'")]
    InvalidNumber { field: String, text: String },

    #[error("invalid selector for field '{field}': {message}")]
    InvalidSelector { field: String, message: String },
}

/// How many values a field takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Exactly one value; extraction fails without it
    #[default]
    Required,
    /// One value, or `Absent`
    Optional,
    /// Every match, always as a list
    List,
}

/// How a field's text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
}

/// Where a field's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Element text with whitespace collapsed
    Text,
    /// The named attribute
    Attr(String),
}

/// One extracted value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractedValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
    /// An optional field that was not found
    Absent,
}

/// The fields extracted from one page (or one item on a page)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// Page the record came from
    pub url: String,
    pub fields: BTreeMap<String, ExtractedValue>,
}

impl ExtractedRecord {
    pub fn get(&self, field: &str) -> Option<&ExtractedValue> {
        self.fields.get(field)
    }
}

/// A compiled field specification
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: SelectorKind,
    pub source: ValueSource,
    pub cardinality: Cardinality,
    pub value_type: ValueType,
    selector: Selector,
}

impl FieldSpec {
    /// Parses and compiles a field
    ///
    /// # Arguments
    ///
    /// * `name` - Output field name
    /// * `expr` - Selector expression (see `SelectorKind`)
    /// * `source` - Element text or an attribute
    /// * `cardinality` - Required, optional or list
    /// * `value_type` - String or number
    pub fn new(
        name: &str,
        expr: &str,
        source: ValueSource,
        cardinality: Cardinality,
        value_type: ValueType,
    ) -> Result<Self, ExtractError> {
        let invalid = |message: String| ExtractError::InvalidSelector {
            field: name.to_string(),
            message,
        };
        let kind = SelectorKind::parse(expr).map_err(invalid)?;
        let selector = kind.compile().map_err(invalid)?;

        Ok(Self {
            name: name.to_string(),
            kind,
            source,
            cardinality,
            value_type,
            selector,
        })
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match &self.source {
            ValueSource::Text => collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
            ValueSource::Attr(attr) => element.value().attr(attr)?.trim().to_string(),
        };
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    }

    fn evaluate<'a>(
        &self,
        matches: impl Iterator<Item = ElementRef<'a>>,
    ) -> Result<ExtractedValue, ExtractError> {
        let mut values = matches.filter_map(|el| self.value_of(el));

        if self.cardinality == Cardinality::List {
            return Ok(ExtractedValue::List(values.collect()));
        }

        let Some(text) = values.next() else {
            return match self.cardinality {
                Cardinality::Required => Err(ExtractError::MissingField {
                    field: self.name.clone(),
                }),
                _ => Ok(ExtractedValue::Absent),
            };
        };

        match self.value_type {
            ValueType::String => Ok(ExtractedValue::Text(text)),
            ValueType::Number => match parse_number(&text) {
                Some(n) => Ok(ExtractedValue::Number(n)),
                None if self.cardinality == Cardinality::Required => {
                    Err(ExtractError::InvalidNumber {
                        field: self.name.clone(),
                        text,
                    })
                }
                None => Ok(ExtractedValue::Absent),
            },
        }
    }
}

/// Turns HTML documents into records
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    fields: Vec<FieldSpec>,
    item_selector: Option<Selector>,
}

impl Extractor {
    /// Creates an extractor that yields one record per document
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            item_selector: None,
        }
    }

    /// Switches to item mode: one record per element matching `expr`
    pub fn with_item_selector(mut self, expr: &str) -> Result<Self, ExtractError> {
        let invalid = |message: String| ExtractError::InvalidSelector {
            field: "item-selector".to_string(),
            message,
        };
        let selector = SelectorKind::parse(expr)
            .map_err(invalid)?
            .compile()
            .map_err(invalid)?;
        self.item_selector = Some(selector);
        Ok(self)
    }

    /// Builds an extractor from the `[extract]` configuration
    pub fn from_config(config: &ExtractConfig) -> Result<Self, ExtractError> {
        let fields = config
            .fields
            .iter()
            .map(|f| {
                let source = match &f.attr {
                    Some(attr) => ValueSource::Attr(attr.clone()),
                    None => ValueSource::Text,
                };
                FieldSpec::new(&f.name, &f.selector, source, f.cardinality, f.value_type)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let extractor = Self::new(fields);
        match &config.item_selector {
            Some(expr) => extractor.with_item_selector(expr),
            None => Ok(extractor),
        }
    }

    /// True when no fields are configured
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in configuration order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Extracts one record from a whole document
    pub fn extract(&self, body: &str, url: &str) -> Result<ExtractedRecord, ExtractError> {
        let document = Html::parse_document(body);
        let mut fields = BTreeMap::new();

        for spec in &self.fields {
            let value = spec.evaluate(document.select(&spec.selector))?;
            fields.insert(spec.name.clone(), value);
        }

        Ok(ExtractedRecord {
            url: url.to_string(),
            fields,
        })
    }

    /// Extracts one record per item container
    ///
    /// Each item succeeds or fails on its own. Without an item selector
    /// this is `extract` on the whole document.
    pub fn extract_items(
        &self,
        body: &str,
        url: &str,
    ) -> Vec<Result<ExtractedRecord, ExtractError>> {
        let Some(item_selector) = &self.item_selector else {
            return vec![self.extract(body, url)];
        };

        let document = Html::parse_document(body);
        document
            .select(item_selector)
            .map(|item| {
                let mut fields = BTreeMap::new();
                for spec in &self.fields {
                    let value = spec.evaluate(item.select(&spec.selector))?;
                    fields.insert(spec.name.clone(), value);
                }
                Ok(ExtractedRecord {
                    url: url.to_string(),
                    fields,
                })
            })
            .collect()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads the first decimal literal in `text` (`"£1,051.77"` → `1051.77`)
fn parse_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;

    let mut literal = String::new();
    if start > 0 && chars[start - 1] == '-' {
        literal.push('-');
    }

    let mut seen_dot = false;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let next_is_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        match c {
            d if d.is_ascii_digit() => literal.push(d),
            ',' if next_is_digit && !seen_dot => {}
            '.' if next_is_digit && !seen_dot => {
                seen_dot = true;
                literal.push('.');
            }
            _ => break,
        }
        i += 1;
    }

    literal.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK_PAGE: &str = r#"
        <html><head><title>A Light in the Attic</title></head>
        <body>
          <div class="product_main">
            <h1>A Light in the   Attic</h1>
            <p class="price_color">£51.77</p>
            <p class="star-rating Three"></p>
            <ul class="breadcrumb"><li><a href="/">Home</a></li><li><a href="/poetry">Poetry</a></li></ul>
          </div>
        </body></html>
    "#;

    fn field(name: &str, expr: &str, cardinality: Cardinality) -> FieldSpec {
        FieldSpec::new(name, expr, ValueSource::Text, cardinality, ValueType::String).unwrap()
    }

    #[test]
    fn test_extract_required_fields() {
        let extractor = Extractor::new(vec![
            field("title", "tag:h1", Cardinality::Required),
            FieldSpec::new(
                "price",
                "class:price_color",
                ValueSource::Text,
                Cardinality::Required,
                ValueType::Number,
            )
            .unwrap(),
        ]);

        let record = extractor.extract(BOOK_PAGE, "https://books.test/a").unwrap();
        assert_eq!(record.url, "https://books.test/a");
        assert_eq!(
            record.get("title"),
            Some(&ExtractedValue::Text("A Light in the Attic".to_string()))
        );
        assert_eq!(record.get("price"), Some(&ExtractedValue::Number(51.77)));
    }

    #[test]
    fn test_missing_required_field_names_it() {
        let extractor = Extractor::new(vec![
            field("title", "tag:h1", Cardinality::Required),
            field("isbn", "id:isbn", Cardinality::Required),
        ]);

        let err = extractor.extract(BOOK_PAGE, "u").unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingField {
                field: "isbn".to_string()
            }
        );

        let with_isbn = BOOK_PAGE.replace("</body>", "<span id=\"isbn\">123</span></body>");
        assert!(extractor.extract(&with_isbn, "u").is_ok());
    }

    #[test]
    fn test_optional_field_is_absent() {
        let extractor = Extractor::new(vec![field("isbn", "id:isbn", Cardinality::Optional)]);
        let record = extractor.extract(BOOK_PAGE, "u").unwrap();
        assert_eq!(record.get("isbn"), Some(&ExtractedValue::Absent));
    }

    #[test]
    fn test_list_with_single_match_is_list() {
        let extractor = Extractor::new(vec![
            field("heading", "tag:h1", Cardinality::List),
            field("crumbs", "path:ul.breadcrumb a", Cardinality::List),
            field("none", "tag:table", Cardinality::List),
        ]);

        let record = extractor.extract(BOOK_PAGE, "u").unwrap();
        assert_eq!(
            record.get("heading"),
            Some(&ExtractedValue::List(vec!["A Light in the Attic".to_string()]))
        );
        assert_eq!(
            record.get("crumbs"),
            Some(&ExtractedValue::List(vec!["Home".to_string(), "Poetry".to_string()]))
        );
        assert_eq!(record.get("none"), Some(&ExtractedValue::List(vec![])));
    }

    #[test]
    fn test_attribute_source() {
        let extractor = Extractor::new(vec![
            FieldSpec::new(
                "rating",
                "class:star-rating",
                ValueSource::Attr("class".to_string()),
                Cardinality::Required,
                ValueType::String,
            )
            .unwrap(),
            FieldSpec::new(
                "links",
                "attr:href",
                ValueSource::Attr("href".to_string()),
                Cardinality::List,
                ValueType::String,
            )
            .unwrap(),
        ]);

        let record = extractor.extract(BOOK_PAGE, "u").unwrap();
        assert_eq!(
            record.get("rating"),
            Some(&ExtractedValue::Text("star-rating Three".to_string()))
        );
        assert_eq!(
            record.get("links"),
            Some(&ExtractedValue::List(vec!["/".to_string(), "/poetry".to_string()]))
        );
    }

    #[test]
    fn test_missing_attribute_is_missing_value() {
        let extractor = Extractor::new(vec![FieldSpec::new(
            "img",
            "tag:h1",
            ValueSource::Attr("src".to_string()),
            Cardinality::Required,
            ValueType::String,
        )
        .unwrap()]);

        assert!(matches!(
            extractor.extract(BOOK_PAGE, "u"),
            Err(ExtractError::MissingField { .. })
        ));
    }

    #[test]
    fn test_invalid_number() {
        let required = Extractor::new(vec![FieldSpec::new(
            "n",
            "tag:h1",
            ValueSource::Text,
            Cardinality::Required,
            ValueType::Number,
        )
        .unwrap()]);
        assert!(matches!(
            required.extract(BOOK_PAGE, "u"),
            Err(ExtractError::InvalidNumber { .. })
        ));

        let optional = Extractor::new(vec![FieldSpec::new(
            "n",
            "tag:h1",
            ValueSource::Text,
            Cardinality::Optional,
            ValueType::Number,
        )
        .unwrap()]);
        assert_eq!(
            optional.extract(BOOK_PAGE, "u").unwrap().get("n"),
            Some(&ExtractedValue::Absent)
        );
    }

    #[test]
    fn test_malformed_markup_tolerated() {
        let html = r#"<div><h1>Unclosed <b>title<p class="price_color">£3.50"#;
        let extractor = Extractor::new(vec![
            field("title", "tag:h1", Cardinality::Required),
            field("price", "class:price_color", Cardinality::Required),
        ]);
        let record = extractor.extract(html, "u").unwrap();
        assert_eq!(
            record.get("price"),
            Some(&ExtractedValue::Text("£3.50".to_string()))
        );
    }

    #[test]
    fn test_item_mode() {
        let html = r#"
            <article class="product_pod"><h3><a title="Book One">Book...</a></h3><p class="price_color">£10.00</p></article>
            <article class="product_pod"><h3><a title="Book Two">Book...</a></h3></article>
            <article class="product_pod"><h3><a title="Book Three">Book...</a></h3><p class="price_color">£30.50</p></article>
        "#;

        let extractor = Extractor::new(vec![
            FieldSpec::new(
                "title",
                "path:h3 a",
                ValueSource::Attr("title".to_string()),
                Cardinality::Required,
                ValueType::String,
            )
            .unwrap(),
            FieldSpec::new(
                "price",
                "class:price_color",
                ValueSource::Text,
                Cardinality::Required,
                ValueType::Number,
            )
            .unwrap(),
        ])
        .with_item_selector("path:article.product_pod")
        .unwrap();

        let results = extractor.extract_items(html, "https://books.test/");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1].as_ref().unwrap_err(),
            &ExtractError::MissingField {
                field: "price".to_string()
            }
        );
        assert_eq!(
            results[2].as_ref().unwrap().get("price"),
            Some(&ExtractedValue::Number(30.5))
        );
    }

    #[test]
    fn test_invalid_selector_names_field() {
        let err = FieldSpec::new(
            "title",
            "path:h1[[",
            ValueSource::Text,
            Cardinality::Required,
            ValueType::String,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { ref field, .. } if field == "title"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("£51.77"), Some(51.77));
        assert_eq!(parse_number("1,051.00 USD"), Some(1051.0));
        assert_eq!(parse_number("In stock (22 available)"), Some(22.0));
        assert_eq!(parse_number("-4.5°"), Some(-4.5));
        assert_eq!(parse_number("3."), Some(3.0));
        assert_eq!(parse_number("no digits"), None);
    }
}
