//! Selector syntax parser using the `cssparser` crate.
//!
//! Whitespace is significant between compound selectors (it is the
//! descendant combinator), so the top-level loop reads tokens with
//! `next_including_whitespace` and folds runs of whitespace into a pending
//! combinator that an explicit `>`, `+` or `~` may override.

use std::str::FromStr;

use cssparser::{ParseError as CssParseError, Parser, ParserInput, Token};

use crate::selector::{
    AttrOperator, AttributeSelector, Combinator, NthExpr, PseudoClass, Selector, SelectorList,
    SelectorPart, TypeSelector,
};
use crate::{Error, Result};

/// Parse a comma-separated selector group.
///
/// # Example
///
/// ```
/// use xooie_style::parser::parse_selector_list;
///
/// let list = parse_selector_list(r#"ul > li.tab, [data-x-role="content"]"#).unwrap();
/// assert_eq!(list.0.len(), 2);
/// assert_eq!(list.to_string(), r#"ul > li.tab, [data-x-role="content"]"#);
/// ```
pub fn parse_selector_list(source: &str) -> Result<SelectorList> {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut selectors = vec![];

    loop {
        let (selector, more) = parse_selector(&mut parser, source)?;
        selectors.push(selector);
        if !more {
            break;
        }
    }

    tracing::trace!(target: "xooie_style::parser", selector = source, count = selectors.len(), "parsed selector list");
    Ok(SelectorList(selectors))
}

impl FromStr for SelectorList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_selector_list(s)
    }
}

/// Parse one complex selector. The flag reports whether a comma followed it.
fn parse_selector<'i>(parser: &mut Parser<'i, '_>, source: &str) -> Result<(Selector, bool)> {
    let mut parts = vec![];
    let mut combinators = vec![];
    let mut current = SelectorPart::default();
    let mut pending: Option<Combinator> = None;
    let mut more = false;

    parser.skip_whitespace();

    loop {
        let token = match parser.next_including_whitespace() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        // Explicit combinators and separators.
        match &token {
            Token::WhiteSpace(_) => {
                if !current.is_empty() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
                continue;
            }
            Token::Comma => {
                more = true;
                break;
            }
            Token::Delim(c @ ('>' | '+' | '~')) => {
                if current.is_empty() {
                    return Err(Error::invalid_selector(source, format!("Unexpected combinator '{c}'")));
                }
                pending = Some(match *c {
                    '>' => Combinator::Child,
                    '+' => Combinator::AdjacentSibling,
                    _ => Combinator::GeneralSibling,
                });
                continue;
            }
            _ => {}
        }

        // Any other token starts or extends a compound selector.
        if let Some(combinator) = pending.take() {
            parts.push(std::mem::take(&mut current));
            combinators.push(combinator);
        }

        match token {
            Token::Ident(name) => {
                if !current.is_empty() {
                    return Err(Error::invalid_selector(
                        source,
                        format!("Unexpected identifier '{}'", &*name),
                    ));
                }
                current.type_selector = Some(TypeSelector::Tag(name.to_ascii_lowercase()));
            }

            Token::Delim('*') => {
                if !current.is_empty() {
                    return Err(Error::invalid_selector(source, "Misplaced '*'"));
                }
                current.type_selector = Some(TypeSelector::Universal);
            }

            Token::Delim('.') => {
                let class = match parser.next_including_whitespace() {
                    Ok(Token::Ident(class)) => class.to_string(),
                    _ => return Err(Error::invalid_selector(source, "Expected class name after '.'")),
                };
                current.classes.push(class);
            }

            Token::IDHash(id) => {
                if current.id.is_some() {
                    return Err(Error::invalid_selector(source, "Duplicate id selector"));
                }
                current.id = Some(id.to_string());
            }

            Token::SquareBracketBlock => {
                let attribute = parser
                    .parse_nested_block(|p| parse_attribute(p))
                    .map_err(|_: CssParseError<'_, ()>| {
                        Error::invalid_selector(source, "Invalid attribute selector")
                    })?;
                current.attributes.push(attribute);
            }

            Token::Colon => {
                let pseudo = parse_pseudo_class(parser, source)?;
                current.pseudo_classes.push(pseudo);
            }

            other => {
                return Err(Error::invalid_selector(source, format!("Unexpected token {other:?}")));
            }
        }
    }

    if pending.is_some_and(|c| c != Combinator::Descendant) {
        return Err(Error::invalid_selector(source, "Dangling combinator"));
    }
    if current.is_empty() {
        return Err(Error::invalid_selector(source, "Empty selector"));
    }
    parts.push(current);

    Ok((Selector { parts, combinators }, more))
}

/// Parse the inside of `[...]`.
fn parse_attribute<'i>(
    parser: &mut Parser<'i, '_>,
) -> std::result::Result<AttributeSelector, CssParseError<'i, ()>> {
    let name = parser.expect_ident()?.to_string();

    if parser.is_exhausted() {
        return Ok(AttributeSelector::exists(name));
    }

    let location = parser.current_source_location();
    let op = match parser.next()? {
        Token::Delim('=') => AttrOperator::Equals,
        Token::IncludeMatch => AttrOperator::Includes,
        Token::DashMatch => AttrOperator::DashMatch,
        Token::PrefixMatch => AttrOperator::Prefix,
        Token::SuffixMatch => AttrOperator::Suffix,
        Token::SubstringMatch => AttrOperator::Substring,
        _ => return Err(location.new_custom_error(())),
    };

    let location = parser.current_source_location();
    let value = match parser.next()? {
        Token::Ident(value) | Token::QuotedString(value) => value.to_string(),
        Token::Number {
            int_value: Some(v), ..
        } => v.to_string(),
        _ => return Err(location.new_custom_error(())),
    };
    parser.expect_exhausted()?;

    Ok(AttributeSelector {
        name,
        test: Some((op, value)),
    })
}

/// Parse a pseudo-class after its leading ':'.
fn parse_pseudo_class(parser: &mut Parser<'_, '_>, source: &str) -> Result<PseudoClass> {
    let token = parser
        .next_including_whitespace()
        .map(|t| t.clone())
        .map_err(|_| Error::invalid_selector(source, "Expected pseudo-class name after ':'"))?;

    match token {
        Token::Ident(name) => PseudoClass::from_css(&name).ok_or_else(|| {
            Error::invalid_selector(source, format!("Unknown pseudo-class ':{}'", &*name))
        }),
        Token::Function(name) if name.eq_ignore_ascii_case("nth-child") => {
            let expr = parser.parse_nested_block(|p| parse_nth_expr(p)).map_err(
                |_: CssParseError<'_, ()>| Error::invalid_selector(source, "Invalid nth-child expression"),
            )?;
            Ok(PseudoClass::NthChild(expr))
        }
        Token::Function(name) if name.eq_ignore_ascii_case("not") => {
            let inner = parser
                .parse_nested_block(|p| parse_simple_selector(p))
                .map_err(|_: CssParseError<'_, ()>| {
                    Error::invalid_selector(source, "Invalid :not() argument")
                })?;
            Ok(PseudoClass::Not(Box::new(inner)))
        }
        other => Err(Error::invalid_selector(source, format!("Unknown pseudo-class {other:?}"))),
    }
}

/// Parse a compound selector (for :not() argument).
fn parse_simple_selector<'i>(
    parser: &mut Parser<'i, '_>,
) -> std::result::Result<SelectorPart, CssParseError<'i, ()>> {
    let mut part = SelectorPart::default();

    while !parser.is_exhausted() {
        let location = parser.current_source_location();
        match parser.next()?.clone() {
            Token::Ident(name) => {
                part.type_selector = Some(TypeSelector::Tag(name.to_ascii_lowercase()));
            }
            Token::Delim('*') => {
                part.type_selector = Some(TypeSelector::Universal);
            }
            Token::Delim('.') => {
                let class = parser.expect_ident()?;
                part.classes.push(class.to_string());
            }
            Token::IDHash(id) => {
                part.id = Some(id.to_string());
            }
            Token::SquareBracketBlock => {
                let attribute = parser.parse_nested_block(|p| parse_attribute(p))?;
                part.attributes.push(attribute);
            }
            _ => return Err(location.new_custom_error(())),
        }
    }

    if part.is_empty() {
        return Err(parser.new_custom_error(()));
    }
    Ok(part)
}

/// Parse nth-child expression (e.g., "odd", "even", "3", "2n+1").
fn parse_nth_expr<'i>(
    parser: &mut Parser<'i, '_>,
) -> std::result::Result<NthExpr, CssParseError<'i, ()>> {
    let (a, b) = cssparser::parse_nth(parser)?;
    parser.expect_exhausted()?;
    Ok(NthExpr::new(a, b))
}
