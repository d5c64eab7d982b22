use super::{Rule, SourceInfo};
use crate::ast::Span;
use crate::error::SclError;
use crate::value::Value;
use pest::iterators::Pair;

/// Parse a `constant` pair (signed numbers, strings, chars, booleans)
pub(crate) fn parse_constant(pair: Pair<Rule>, info: &SourceInfo) -> Result<Value, SclError> {
    let mut negative = false;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::neg => negative = true,
            _ => {
                let value = parse_literal(inner, info)?;
                return if negative {
                    negate_literal(value, &pair, info)
                } else {
                    Ok(value)
                };
            }
        }
    }
    Err(info.error("empty constant", &pair))
}

/// Parse a literal pair: `int_lit`, `float_lit`, `string_lit`, `char_lit`, `bool_lit`
pub(crate) fn parse_literal(pair: Pair<Rule>, info: &SourceInfo) -> Result<Value, SclError> {
    match pair.as_rule() {
        Rule::int_lit => parse_int(pair.as_str(), false)
            .ok_or_else(|| info.error("integer literal out of range", &pair)),
        Rule::float_lit => pair
            .as_str()
            .parse::<f64>()
            .map(Value::F64)
            .map_err(|e| info.error(format!("invalid float literal: {}", e), &pair)),
        Rule::bool_lit => Ok(Value::Bool(pair.as_str() == "true")),
        Rule::string_lit => {
            let inner = pair
                .clone()
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or("");
            Ok(Value::string(unescape(inner)))
        }
        Rule::char_lit => {
            let inner = pair
                .clone()
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or("");
            unescape(inner)
                .chars()
                .next()
                .map(Value::Char)
                .ok_or_else(|| info.error("empty character literal", &pair))
        }
        other => Err(info.error(format!("unexpected literal {:?}", other), &pair)),
    }
}

/// Integer literals are `i32` when they fit and `i64` otherwise
fn parse_int(digits: &str, negative: bool) -> Option<Value> {
    let wide: i128 = digits.parse().ok()?;
    let wide = if negative { -wide } else { wide };
    if let Ok(i) = i32::try_from(wide) {
        Some(Value::I32(i))
    } else {
        i64::try_from(wide).ok().map(Value::I64)
    }
}

fn negate_literal(value: Value, pair: &Pair<Rule>, info: &SourceInfo) -> Result<Value, SclError> {
    match value {
        Value::I32(i) => parse_int(&i.to_string(), true),
        Value::I64(i) => parse_int(&i.to_string(), true),
        Value::F64(f) => Some(Value::F64(-f)),
        _ => None,
    }
    .ok_or_else(|| info.error("cannot negate literal", pair))
}

pub(crate) fn parse_tag(pair: Pair<Rule>, info: &SourceInfo) -> Result<f64, SclError> {
    let tag: f64 = pair
        .as_str()
        .parse()
        .map_err(|e| info.error(format!("invalid tag: {}", e), &pair))?;
    if !(0.0..=1.0).contains(&tag) {
        return Err(SclError::parse(
            format!("tag {} is not a probability", tag),
            Span::from_pest_span(pair.as_span()),
            info.source_id.clone(),
            info.source.clone(),
        ));
    }
    Ok(tag)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
