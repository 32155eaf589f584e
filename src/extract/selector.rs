//! Selector expressions for extraction fields
//!
//! | Expression | Matches |
//! |------------|---------|
//! | `tag:h1` | elements by tag name |
//! | `id:main` | the element with that id |
//! | `class:price_color` | elements carrying that class |
//! | `attr:data-sku` | elements with the attribute |
//! | `attr:itemprop=name` | elements whose attribute has that value |
//! | `path:article h3 a` | a CSS selector path |
//!
//! An expression without a known prefix is a `path`.

use scraper::Selector;

/// The kind of a selector expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKind {
    Tag(String),
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
    Path(String),
}

impl SelectorKind {
    /// Parses an expression; fails only on an empty operand
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        let (prefix, rest) = match expr.split_once(':') {
            Some((p, r)) if matches!(p, "tag" | "id" | "class" | "attr" | "path") => {
                (p, r.trim())
            }
            _ => ("path", expr),
        };

        if rest.is_empty() {
            return Err(format!("empty {} selector", prefix));
        }

        let kind = match prefix {
            "tag" => Self::Tag(rest.to_string()),
            "id" => Self::Id(rest.to_string()),
            "class" => Self::Class(rest.to_string()),
            "attr" => match rest.split_once('=') {
                Some((name, value)) => Self::Attribute {
                    name: name.trim().to_string(),
                    value: Some(value.trim().trim_matches('"').to_string()),
                },
                None => Self::Attribute {
                    name: rest.to_string(),
                    value: None,
                },
            },
            _ => Self::Path(rest.to_string()),
        };

        Ok(kind)
    }

    /// Renders the selector as CSS
    pub fn to_css(&self) -> String {
        match self {
            Self::Tag(name) => name.clone(),
            Self::Id(id) => format!("[id=\"{}\"]", escape(id)),
            Self::Class(class) => format!("[class~=\"{}\"]", escape(class)),
            Self::Attribute { name, value: None } => format!("[{}]", name),
            Self::Attribute {
                name,
                value: Some(value),
            } => format!("[{}=\"{}\"]", name, escape(value)),
            Self::Path(css) => css.clone(),
        }
    }

    /// Compiles the selector
    pub fn compile(&self) -> Result<Selector, String> {
        let css = self.to_css();
        Selector::parse(&css).map_err(|e| format!("invalid selector '{}': {:?}", css, e))
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(SelectorKind::parse("tag:h1").unwrap(), SelectorKind::Tag("h1".into()));
        assert_eq!(SelectorKind::parse("id:main").unwrap(), SelectorKind::Id("main".into()));
        assert_eq!(
            SelectorKind::parse("class:price_color").unwrap(),
            SelectorKind::Class("price_color".into())
        );
        assert_eq!(
            SelectorKind::parse("attr:data-sku").unwrap(),
            SelectorKind::Attribute {
                name: "data-sku".into(),
                value: None
            }
        );
        assert_eq!(
            SelectorKind::parse("attr:itemprop=\"name\"").unwrap(),
            SelectorKind::Attribute {
                name: "itemprop".into(),
                value: Some("name".into())
            }
        );
        assert_eq!(
            SelectorKind::parse("path:article h3 a").unwrap(),
            SelectorKind::Path("article h3 a".into())
        );
    }

    #[test]
    fn test_bare_expression_is_path() {
        assert_eq!(
            SelectorKind::parse("div.content > p").unwrap(),
            SelectorKind::Path("div.content > p".into())
        );
        // pseudo-classes keep their colon
        assert_eq!(
            SelectorKind::parse("li:first-child").unwrap(),
            SelectorKind::Path("li:first-child".into())
        );
    }

    #[test]
    fn test_empty_operand_rejected() {
        assert!(SelectorKind::parse("class:").is_err());
        assert!(SelectorKind::parse("").is_err());
    }

    #[test]
    fn test_compile() {
        assert!(SelectorKind::parse("class:star-rating").unwrap().compile().is_ok());
        assert!(SelectorKind::parse("id:a\"b").unwrap().compile().is_ok());
        assert!(SelectorKind::parse("path:h1[[").unwrap().compile().is_err());
    }
}
