//! Resolution of tag attributes.
//!
//! Splits the raw attributes of a tag into regular attributes (with their
//! expressions parsed) and the `:if`, `:for` and `:let` special attributes.

use ceex_lexer::{AttrValue, Position, TagKind};

use crate::ast::{Attribute, AttributeValue, SpecialAttrs};
use crate::expr_parser::ExprParser;
use crate::ParseError;

/// An attribute as it came out of the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAttr {
    Named {
        name: String,
        value: AttrValue,
        position: Position,
    },
    Root {
        code: String,
        position: Position,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Special {
    If,
    For,
    Let,
}

impl Special {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            ":if" => Some(Special::If),
            ":for" => Some(Special::For),
            ":let" => Some(Special::Let),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Special::If => ":if",
            Special::For => ":for",
            Special::Let => ":let",
        }
    }
}

/// Resolve the attributes of one tag.
///
/// `self_closing` is true for `<.x />` and `<:x />`; void elements pass
/// false since they never accept `:let` anyway.
pub fn resolve(
    raw: Vec<RawAttr>,
    kind: TagKind,
    self_closing: bool,
) -> Result<(Vec<Attribute>, SpecialAttrs), ParseError> {
    let mut attrs = Vec::with_capacity(raw.len());
    let mut special = SpecialAttrs::default();
    let mut seen: Vec<(Special, Position)> = Vec::new();

    for attr in raw {
        match attr {
            RawAttr::Root { code, position } => {
                let expr = ExprParser::parse(&code, position)?;
                attrs.push(Attribute::Root { expr, position });
            }
            RawAttr::Named {
                name,
                value,
                position,
            } if name.starts_with(':') => {
                let which = match Special::from_name(&name) {
                    Some(Special::Let) if kind == TagKind::Element => None,
                    other => other,
                };
                let Some(which) = which else {
                    return Err(ParseError::new(
                        format!("unsupported attribute `{name}` in tags"),
                        position,
                    ));
                };

                if let Some((_, first)) = seen.iter().find(|(s, _)| *s == which) {
                    return Err(ParseError::new(
                        format!(
                            "cannot define multiple `{0}` attributes. Another `{0}` has already been defined at line {1}",
                            which.name(),
                            first.line
                        ),
                        position,
                    ));
                }
                seen.push((which, position));

                if which == Special::Let && self_closing {
                    let target = if kind == TagKind::Slot {
                        "a slot"
                    } else {
                        "a component"
                    };
                    return Err(ParseError::new(
                        format!("cannot use `:let` on {target} without inner content"),
                        position,
                    ));
                }

                let AttrValue::Expr(code) = value else {
                    return Err(ParseError::new(
                        format!("`{}` must be an expression between {{...}}", which.name()),
                        position,
                    ));
                };

                match which {
                    Special::If => special.condition = Some(ExprParser::parse(&code, position)?),
                    Special::For => {
                        special.generator =
                            Some(ExprParser::parse_generator(&code, position).map_err(|err| {
                                ParseError::new(
                                    format!(
                                        "`:for` must be a generator expression (pattern <- enumerable) between {{...}}, got: `{}`",
                                        code.trim()
                                    ),
                                    position,
                                )
                                .with_hint(err.message)
                            })?)
                    }
                    Special::Let => {
                        special.binding = Some(ExprParser::parse_pattern(&code, position)?)
                    }
                }
            }
            RawAttr::Named {
                name,
                value,
                position,
            } => {
                let value = match value {
                    AttrValue::Static { value, quote } => AttributeValue::Static { value, quote },
                    AttrValue::Boolean => AttributeValue::Boolean,
                    AttrValue::Expr(code) => {
                        AttributeValue::Expr(ExprParser::parse(&code, position)?)
                    }
                };
                attrs.push(Attribute::Named {
                    name,
                    value,
                    position,
                });
            }
        }
    }

    Ok((attrs, special))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, PatternKind};
    use pretty_assertions::assert_eq;

    fn named(name: &str, value: AttrValue, line: usize) -> RawAttr {
        RawAttr::Named {
            name: name.into(),
            value,
            position: Position::new(0, line, 1),
        }
    }

    fn expr(code: &str) -> AttrValue {
        AttrValue::Expr(code.into())
    }

    #[test]
    fn test_regular_attributes_keep_order() {
        let raw = vec![
            named(
                "id",
                AttrValue::Static {
                    value: "a".into(),
                    quote: '"',
                },
                1,
            ),
            RawAttr::Root {
                code: "@rest".into(),
                position: Position::default(),
            },
            named("hidden", AttrValue::Boolean, 1),
            named("title", expr("@title"), 1),
        ];
        let (attrs, special) = resolve(raw, TagKind::Element, false).unwrap();
        assert!(special.is_empty());
        assert_eq!(attrs.len(), 4);
        assert!(matches!(&attrs[1], Attribute::Root { expr, .. } if expr.kind == ExprKind::Assign("rest".into())));
        assert!(matches!(&attrs[2], Attribute::Named { value: AttributeValue::Boolean, .. }));
    }

    #[test]
    fn test_special_attributes_are_extracted() {
        let raw = vec![
            named(":for", expr("x <- @xs"), 1),
            named("class", expr("x"), 1),
            named(":if", expr("x > 1"), 1),
        ];
        let (attrs, special) = resolve(raw, TagKind::Element, false).unwrap();
        assert_eq!(attrs.len(), 1);
        assert!(special.condition.is_some());
        assert_eq!(
            special.generator.map(|g| g.pattern.kind),
            Some(PatternKind::Variable("x".into()))
        );
    }

    #[test]
    fn test_let_on_component() {
        let raw = vec![named(":let", expr("{a, b}"), 1)];
        let (_, special) = resolve(raw, TagKind::LocalComponent, false).unwrap();
        assert_eq!(special.binding.map(|p| p.source), Some("{a, b}".into()));
    }

    #[test]
    fn test_duplicate_if() {
        let raw = vec![named(":if", expr("true"), 2), named(":if", expr("false"), 4)];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert_eq!(
            err.message,
            "cannot define multiple `:if` attributes. Another `:if` has already been defined at line 2"
        );
        assert_eq!(err.position.line, 4);
    }

    #[test]
    fn test_let_on_element_is_unsupported() {
        let raw = vec![named(":let", expr("x"), 1)];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert_eq!(err.message, "unsupported attribute `:let` in tags");
    }

    #[test]
    fn test_unknown_special() {
        let raw = vec![named(":key", expr("x"), 1)];
        let err = resolve(raw, TagKind::LocalComponent, false).unwrap_err();
        assert_eq!(err.message, "unsupported attribute `:key` in tags");
    }

    #[test]
    fn test_let_on_self_closing() {
        let raw = vec![named(":let", expr("x"), 1)];
        let err = resolve(raw.clone(), TagKind::RemoteComponent, true).unwrap_err();
        assert_eq!(
            err.message,
            "cannot use `:let` on a component without inner content"
        );
        let err = resolve(raw, TagKind::Slot, true).unwrap_err();
        assert_eq!(err.message, "cannot use `:let` on a slot without inner content");
    }

    #[test]
    fn test_special_requires_expression() {
        let raw = vec![named(
            ":if",
            AttrValue::Static {
                value: "true".into(),
                quote: '"',
            },
            1,
        )];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert_eq!(err.message, "`:if` must be an expression between {...}");
    }

    #[test]
    fn test_for_requires_generator() {
        let raw = vec![named(":for", expr("@items"), 1)];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert_eq!(
            err.message,
            "`:for` must be a generator expression (pattern <- enumerable) between {...}, got: `@items`"
        );
    }

    #[test]
    fn test_for_error_keeps_syntax_detail() {
        let raw = vec![named(":for", expr("x <- [1,"), 2)];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert!(err.message.starts_with("`:for` must be a generator expression"));
        assert!(err
            .hint
            .as_deref()
            .unwrap()
            .starts_with("syntax error in expression `x <- [1,`"));
    }

    #[test]
    fn test_bad_attribute_expression() {
        let raw = vec![named("class", expr("1 +"), 3)];
        let err = resolve(raw, TagKind::Element, false).unwrap_err();
        assert_eq!(err.position.line, 3);
        assert!(err.message.starts_with("syntax error in expression `1 +`"));
    }
}
