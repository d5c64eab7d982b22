use super::literals::{parse_constant, parse_literal};
use super::{Rule, SourceInfo};
use crate::ast::{Atom, BinaryOp, Expr, Formula, Span, Term, UnaryOp};
use crate::error::SclError;
use crate::value::Value;
use pest::iterators::Pair;

pub(crate) fn parse_formula(pair: Pair<Rule>, info: &SourceInfo) -> Result<Formula, SclError> {
    // formula = { conjunction ~ (kw_or ~ conjunction)* }
    let mut disjuncts = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::conjunction {
            disjuncts.push(parse_conjunction(inner, info)?);
        }
    }
    Ok(if disjuncts.len() == 1 {
        disjuncts.remove(0)
    } else {
        Formula::Or(disjuncts)
    })
}

fn parse_conjunction(pair: Pair<Rule>, info: &SourceInfo) -> Result<Formula, SclError> {
    let mut conjuncts = Vec::new();
    for inner in pair.into_inner() {
        let literal = match inner.as_rule() {
            Rule::atom => Formula::Atom(parse_atom(inner, info)?),
            Rule::negated_atom => {
                let atom = inner
                    .clone()
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::atom)
                    .ok_or_else(|| info.error("missing negated atom", &inner))?;
                Formula::Not(parse_atom(atom, info)?)
            }
            Rule::constraint => {
                let span = Span::from_pest_span(inner.as_span());
                let expr = inner
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| info.error("empty constraint", &inner))?;
                Formula::Constraint(parse_expr(expr, info)?, span)
            }
            Rule::formula => info.nested(1, || parse_formula(inner, info))?,
            _ => continue,
        };
        conjuncts.push(literal);
    }
    Ok(if conjuncts.len() == 1 {
        conjuncts.remove(0)
    } else {
        Formula::And(conjuncts)
    })
}

fn parse_atom(pair: Pair<Rule>, info: &SourceInfo) -> Result<Atom, SclError> {
    let span = Span::from_pest_span(pair.as_span());
    let mut relation = None;
    let mut args = Vec::new();

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::identifier => relation = Some(inner.as_str().to_string()),
            Rule::term => args.push(parse_term(inner, info)?),
            _ => {}
        }
    }

    Ok(Atom {
        relation: relation.ok_or_else(|| info.error("missing relation name", &pair))?,
        args,
        span,
    })
}

fn parse_term(pair: Pair<Rule>, info: &SourceInfo) -> Result<Term, SclError> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| info.error("empty term", &pair))?;
    match inner.as_rule() {
        Rule::wildcard => Ok(Term::Wildcard),
        Rule::identifier => Ok(Term::Var(inner.as_str().to_string())),
        Rule::constant => Ok(Term::Const(parse_constant(inner, info)?)),
        _ => Err(info.error("unexpected term", &inner)),
    }
}

pub(crate) fn parse_expr(pair: Pair<Rule>, info: &SourceInfo) -> Result<Expr, SclError> {
    match pair.as_rule() {
        Rule::expr => {
            let inner = pair
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| info.error("empty expression", &pair))?;
            info.nested(1, || parse_expr(inner, info))
        }
        Rule::or_expr
        | Rule::and_expr
        | Rule::cmp_expr
        | Rule::xor_expr
        | Rule::add_expr
        | Rule::mul_expr => parse_binary_chain(pair, info),
        Rule::unary => parse_unary(pair, info),
        Rule::variable => Ok(Expr::Var(pair.as_str().to_string())),
        Rule::int_lit | Rule::float_lit | Rule::string_lit | Rule::char_lit | Rule::bool_lit => {
            Ok(Expr::Const(parse_literal(pair, info)?))
        }
        _ => Err(info.error("unexpected expression", &pair)),
    }
}

/// Left-fold `operand (op operand)*` into nested binary expressions
fn parse_binary_chain(pair: Pair<Rule>, info: &SourceInfo) -> Result<Expr, SclError> {
    // Each operator nests the chain one level deeper
    let operators = pair.clone().into_inner().count() / 2;
    info.nested(operators, || {
        let mut inner = pair.clone().into_inner();
        let first = inner
            .next()
            .ok_or_else(|| info.error("empty expression", &pair))?;
        let mut expr = parse_expr(first, info)?;

        while let Some(op_pair) = inner.next() {
            let op = parse_binary_op(&op_pair, info)?;
            let rhs_pair = inner
                .next()
                .ok_or_else(|| info.error("missing right operand", &op_pair))?;
            let rhs = parse_expr(rhs_pair, info)?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }

        Ok(expr)
    })
}

fn parse_binary_op(pair: &Pair<Rule>, info: &SourceInfo) -> Result<BinaryOp, SclError> {
    let op = match pair.as_str() {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "&&" => BinaryOp::And,
        "||" => BinaryOp::Or,
        "^" => BinaryOp::Xor,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        other => return Err(info.error(format!("unknown operator '{}'", other), pair)),
    };
    Ok(op)
}

fn parse_unary(pair: Pair<Rule>, info: &SourceInfo) -> Result<Expr, SclError> {
    // unary = { unary_op* ~ primary }
    let mut ops = Vec::new();
    let mut operand = None;
    for inner in pair.clone().into_inner() {
        if inner.as_rule() == Rule::unary_op {
            ops.push(if inner.as_str() == "-" {
                UnaryOp::Neg
            } else {
                UnaryOp::Not
            });
        } else {
            operand = Some(info.nested(ops.len(), || parse_expr(inner, info))?);
        }
    }

    let mut expr = operand.ok_or_else(|| info.error("missing operand", &pair))?;
    for op in ops.into_iter().rev() {
        expr = match (op, expr) {
            (UnaryOp::Neg, Expr::Const(Value::I32(i))) if i != i32::MIN => {
                Expr::Const(Value::I32(-i))
            }
            (UnaryOp::Neg, Expr::Const(Value::I64(i))) if i != i64::MIN => {
                if let Ok(narrow) = i32::try_from(-i) {
                    Expr::Const(Value::I32(narrow))
                } else {
                    Expr::Const(Value::I64(-i))
                }
            }
            (UnaryOp::Neg, Expr::Const(Value::F64(f))) => Expr::Const(Value::F64(-f)),
            (op, expr) => Expr::Unary(op, Box::new(expr)),
        };
    }
    Ok(expr)
}

/// Evaluate an expression that contains no variables, as used by ground facts
pub(crate) fn fold_constant(expr: &Expr) -> Option<Value> {
    if !expr.variables().is_empty() {
        return None;
    }
    crate::runtime::expression::CompiledExpr::compile(expr, &mut |_| None)?.evaluate(&[])
}
