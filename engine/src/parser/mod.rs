use crate::ast::{FactDecl, Head, Item, Program, QueryDecl, RuleDecl, Span, TypeDecl};
use crate::error::SclError;
use crate::resource_limits::ResourceLimits;
use crate::value::ValueType;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::cell::Cell;
use std::sync::Arc;

pub mod expressions;
pub mod literals;

#[derive(Parser)]
#[grammar = "src/parser/scl.pest"]
pub struct SclParser;

/// Source identity threaded through the builders for error reporting
pub(crate) struct SourceInfo {
    pub source_id: String,
    pub source: Arc<str>,
    depth: Cell<usize>,
    max_depth: usize,
}

impl SourceInfo {
    pub(crate) fn error(&self, message: impl Into<String>, pair: &Pair<Rule>) -> SclError {
        SclError::parse(
            message,
            Span::from_pest_span(pair.as_span()),
            self.source_id.clone(),
            self.source.clone(),
        )
    }

    /// Build a subtree `levels` deeper than the current expression depth
    pub(crate) fn nested<T>(
        &self,
        levels: usize,
        build: impl FnOnce() -> Result<T, SclError>,
    ) -> Result<T, SclError> {
        let outer = self.depth.get();
        let depth = outer + levels;
        if depth > self.max_depth {
            return Err(depth_exceeded(self.max_depth, depth));
        }
        self.depth.set(depth);
        let result = build();
        self.depth.set(outer);
        result
    }
}

fn depth_exceeded(limit: usize, actual: usize) -> SclError {
    SclError::ResourceLimitExceeded {
        limit_name: "max_expression_depth".to_string(),
        limit_value: limit.to_string(),
        actual_value: actual.to_string(),
        suggestion: "Simplify nested expressions to reduce depth".to_string(),
    }
}

/// Deepest parenthesis nesting outside literals and comments
///
/// The grammar descends once per parenthesis, so this runs before pest sees
/// the text.
fn paren_depth(content: &str) -> usize {
    let mut chars = content.chars().peekable();
    let mut depth = 0usize;
    let mut deepest = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            '"' | '\'' => {
                while let Some(next) = chars.next() {
                    if next == '\\' {
                        chars.next();
                    } else if next == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            _ => {}
        }
    }
    deepest
}

pub fn parse(
    content: &str,
    source_id: Option<String>,
    limits: &ResourceLimits,
) -> Result<Program, SclError> {
    if content.len() > limits.max_program_bytes {
        return Err(SclError::ResourceLimitExceeded {
            limit_name: "max_program_bytes".to_string(),
            limit_value: format!("{} bytes", limits.max_program_bytes),
            actual_value: format!("{} bytes", content.len()),
            suggestion: "Reduce the program size".to_string(),
        });
    }

    let nesting = paren_depth(content);
    if nesting > limits.max_expression_depth {
        return Err(depth_exceeded(limits.max_expression_depth, nesting));
    }

    let info = SourceInfo {
        source_id: source_id.unwrap_or_else(|| "<input>".to_string()),
        source: Arc::from(content),
        depth: Cell::new(0),
        max_depth: limits.max_expression_depth,
    };

    match SclParser::parse(Rule::program, content) {
        Ok(pairs) => {
            let mut program = Program::default();
            for pair in pairs {
                if pair.as_rule() == Rule::program {
                    for inner_pair in pair.into_inner() {
                        if let Some(item) = parse_item(inner_pair, &info)? {
                            program.items.push(item);
                        }
                    }
                }
            }
            Ok(program)
        }
        Err(e) => {
            let pest_span = match e.line_col {
                pest::error::LineColLocation::Pos((line, col)) => Span {
                    start: 0,
                    end: 0,
                    line,
                    col,
                },
                pest::error::LineColLocation::Span((start_line, start_col), (_, _)) => Span {
                    start: 0,
                    end: 0,
                    line: start_line,
                    col: start_col,
                },
            };
            let pest_span = match e.location {
                pest::error::InputLocation::Pos(pos) => Span {
                    start: pos,
                    end: pos,
                    ..pest_span
                },
                pest::error::InputLocation::Span((start, end)) => Span {
                    start,
                    end,
                    ..pest_span
                },
            };

            Err(SclError::parse(
                format!("{}", e.variant),
                pest_span,
                info.source_id,
                info.source,
            ))
        }
    }
}

fn parse_item(pair: Pair<Rule>, info: &SourceInfo) -> Result<Option<Item>, SclError> {
    match pair.as_rule() {
        Rule::type_decl => Ok(Some(Item::Type(parse_type_decl(pair, info)?))),
        Rule::query_decl => {
            let span = Span::from_pest_span(pair.as_span());
            let relation = first_identifier(&pair, info)?;
            Ok(Some(Item::Query(QueryDecl { relation, span })))
        }
        Rule::fact_set => Ok(Some(Item::Facts(parse_fact_set(pair, info)?))),
        Rule::fact => Ok(Some(Item::Facts(parse_single_fact(pair, info)?))),
        Rule::rule => Ok(Some(Item::Rule(parse_rule(pair, info)?))),
        _ => Ok(None),
    }
}

fn first_identifier(pair: &Pair<Rule>, info: &SourceInfo) -> Result<String, SclError> {
    pair.clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| info.error("missing relation name", pair))
}

fn parse_type_decl(pair: Pair<Rule>, info: &SourceInfo) -> Result<TypeDecl, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut relation = None;
    let mut args = Vec::new();

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::identifier => relation = Some(inner.as_str().to_string()),
            Rule::type_arg => {
                let mut name = None;
                let mut ty = None;
                for part in inner.clone().into_inner() {
                    match part.as_rule() {
                        Rule::identifier => name = Some(part.as_str().to_string()),
                        Rule::type_name => {
                            ty = Some(
                                part.as_str()
                                    .parse::<ValueType>()
                                    .map_err(|e| info.error(e, &part))?,
                            )
                        }
                        _ => {}
                    }
                }
                let ty = ty.ok_or_else(|| info.error("missing argument type", &inner))?;
                args.push((name, ty));
            }
            _ => {}
        }
    }

    let relation = relation.ok_or_else(|| info.error("missing relation name", &pair))?;
    Ok(TypeDecl {
        relation,
        args,
        span,
    })
}

fn parse_fact_set(pair: Pair<Rule>, info: &SourceInfo) -> Result<FactDecl, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut relation = None;
    let mut facts = Vec::new();

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::identifier => relation = Some(inner.as_str().to_string()),
            Rule::tagged_tuple => {
                let mut tag = None;
                let mut values = Vec::new();
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::tag => tag = Some(literals::parse_tag(part, info)?),
                        Rule::tuple => {
                            for constant in part.into_inner() {
                                values.push(literals::parse_constant(constant, info)?);
                            }
                        }
                        _ => {}
                    }
                }
                facts.push((tag, values));
            }
            _ => {}
        }
    }

    let relation = relation.ok_or_else(|| info.error("missing relation name", &pair))?;
    Ok(FactDecl {
        relation,
        facts,
        span,
    })
}

/// `rel edge(0, 1)` and `rel 0.4::edge(0, 1)`: every head argument must be a constant
fn parse_single_fact(pair: Pair<Rule>, info: &SourceInfo) -> Result<FactDecl, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut tag = None;
    let mut head = None;

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::tag => tag = Some(literals::parse_tag(inner, info)?),
            Rule::head => head = Some(parse_head(inner, info)?),
            _ => {}
        }
    }

    let head = head.ok_or_else(|| info.error("missing fact", &pair))?;
    let mut values = Vec::with_capacity(head.args.len());
    for arg in head.args {
        match expressions::fold_constant(&arg) {
            Some(value) => values.push(value),
            None => {
                return Err(SclError::parse(
                    format!(
                        "fact '{}' must only contain constants; write a rule with a body instead",
                        head.relation
                    ),
                    span,
                    info.source_id.clone(),
                    info.source.clone(),
                ))
            }
        }
    }

    Ok(FactDecl {
        relation: head.relation,
        facts: vec![(tag, values)],
        span,
    })
}

fn parse_rule(pair: Pair<Rule>, info: &SourceInfo) -> Result<RuleDecl, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut head = None;
    let mut body = None;

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::head => head = Some(parse_head(inner, info)?),
            Rule::formula => body = Some(expressions::parse_formula(inner, info)?),
            _ => {}
        }
    }

    Ok(RuleDecl {
        head: head.ok_or_else(|| info.error("missing rule head", &pair))?,
        body: body.ok_or_else(|| info.error("missing rule body", &pair))?,
        span,
    })
}

fn parse_head(pair: Pair<Rule>, info: &SourceInfo) -> Result<Head, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut relation = None;
    let mut args = Vec::new();

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::identifier => relation = Some(inner.as_str().to_string()),
            Rule::expr => args.push(expressions::parse_expr(inner, info)?),
            _ => {}
        }
    }

    Ok(Head {
        relation: relation.ok_or_else(|| info.error("missing relation name", &pair))?,
        args,
        span,
    })
}
