//! Syntax tree of a program
//!
//! Produced by the parser and consumed by the compiler. Every item keeps the
//! `Span` it was parsed from so compile errors can point back into the source.

use crate::value::{Value, ValueType};
use std::fmt;

/// Span representing a location in source code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn from_pest_span(span: pest::Span) -> Self {
        let (line, col) = span.start_pos().line_col();
        Self {
            start: span.start(),
            end: span.end(),
            line,
            col,
        }
    }
}

/// A parsed program: the items of one source text, in source order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn type_decls(&self) -> impl Iterator<Item = &TypeDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Type(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn fact_decls(&self) -> impl Iterator<Item = &FactDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Facts(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Rule(rule) => Some(rule),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Type(TypeDecl),
    Facts(FactDecl),
    Rule(RuleDecl),
    Query(QueryDecl),
}

/// `type edge(a: i32, b: i32)`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub relation: String,
    pub args: Vec<(Option<String>, ValueType)>,
    pub span: Span,
}

impl TypeDecl {
    pub fn types(&self) -> Vec<ValueType> {
        self.args.iter().map(|(_, ty)| *ty).collect()
    }
}

/// `rel edge = {(0, 1), 0.5::(1, 2)}` or `rel 0.9::edge(2, 3)`
#[derive(Debug, Clone, PartialEq)]
pub struct FactDecl {
    pub relation: String,
    pub facts: Vec<(Option<f64>, Vec<Value>)>,
    pub span: Span,
}

/// `rel path(a, c) = edge(a, b), path(b, c)`
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecl {
    pub head: Head,
    pub body: Formula,
    pub span: Span,
}

/// `query path`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDecl {
    pub relation: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub relation: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// A rule body before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Atom(Atom),
    Not(Atom),
    Constraint(Expr, Span),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub relation: String,
    pub args: Vec<Term>,
    pub span: Span,
}

/// Argument of a body atom
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(String),
    Wildcard,
    Const(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression appearing in rule heads and body constraints
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Const(Value),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
}

impl Expr {
    /// Variables referenced by the expression, in first-occurrence order
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables<'a>(&'a self, vars: &mut Vec<&'a str>) {
        match self {
            Expr::Var(name) => {
                if !vars.contains(&name.as_str()) {
                    vars.push(name);
                }
            }
            Expr::Const(_) => {}
            Expr::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Expr::Unary(_, inner) => inner.collect_variables(vars),
        }
    }
}
