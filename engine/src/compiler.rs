//! Compilation from syntax trees to an executable plan
//!
//! Compiling:
//! 1. Collects relation signatures (registered inputs, `type` declarations,
//!    facts, rule heads) and checks arity and type consistency
//! 2. Splits disjunctive bodies into conjunctive rules
//! 3. Orders each body so every variable is bound before it is read
//! 4. Stratifies rules by their negative dependencies

use crate::analysis::DependencyGraph;
use crate::ast::{Atom, Expr, Formula, Program, RuleDecl, Span, Term};
use crate::error::SclError;
use crate::resource_limits::ResourceLimits;
use crate::runtime::expression::CompiledExpr;
use crate::value::{format_tuple, Tuple, Value, ValueType};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// A parsed program together with the source it came from
#[derive(Debug, Clone)]
pub struct SourceProgram {
    pub source_id: String,
    pub text: Arc<str>,
    pub program: Program,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOrigin {
    /// Registered through the context API
    Input,
    /// `type` declaration in the program
    Declared,
    /// Defined only by program facts
    Facts,
    /// Defined by rules
    Derived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationSignature {
    pub name: String,
    pub arity: usize,
    pub types: Option<Vec<ValueType>>,
    pub origin: RelationOrigin,
}

impl RelationSignature {
    /// Coerce a tuple into the declared column types, when there are any
    pub fn coerce(&self, tuple: Tuple) -> Result<Tuple, SclError> {
        if tuple.len() != self.arity {
            return Err(SclError::ArityMismatch {
                relation: self.name.clone(),
                expected: self.arity,
                actual: tuple.len(),
            });
        }
        let Some(types) = &self.types else {
            return Ok(tuple);
        };
        tuple
            .into_iter()
            .zip(types)
            .enumerate()
            .map(|(position, (value, ty))| {
                let found = value.value_type();
                ty.coerce(value).ok_or_else(|| SclError::TypeMismatch {
                    relation: self.name.clone(),
                    position,
                    expected: *ty,
                    found: found.to_string(),
                })
            })
            .collect()
    }
}

/// How one atom argument is matched against a stored tuple
#[derive(Debug, Clone, PartialEq)]
pub enum ArgPattern {
    /// First occurrence of a variable: store the column value
    Bind(usize),
    /// Variable already bound: column must equal it
    Check(usize),
    /// Variable repeated within one atom: column must equal an earlier column
    Same(usize),
    Const(Value),
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyStep {
    Scan {
        relation: String,
        args: Vec<ArgPattern>,
    },
    Negate {
        relation: String,
        args: Vec<ArgPattern>,
    },
    Filter(CompiledExpr),
    Bind {
        slot: usize,
        expr: CompiledExpr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub head: String,
    pub head_args: Vec<CompiledExpr>,
    pub body: Vec<BodyStep>,
    pub num_slots: usize,
    pub span: Span,
    /// Index of the source program the rule came from
    pub source: usize,
}

impl CompiledRule {
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, bool)> {
        self.body.iter().filter_map(|step| match step {
            BodyStep::Scan { relation, .. } => Some((relation.as_str(), false)),
            BodyStep::Negate { relation, .. } => Some((relation.as_str(), true)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramFact {
    pub relation: String,
    pub tag: Option<f64>,
    pub tuple: Tuple,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stratum {
    pub relations: BTreeSet<String>,
    pub rules: Vec<CompiledRule>,
    pub recursive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub relations: BTreeMap<String, RelationSignature>,
    pub facts: Vec<ProgramFact>,
    pub strata: Vec<Stratum>,
}

/// Body literal after disjunctions are split
#[derive(Debug, Clone, Copy)]
enum Literal<'a> {
    Pos(&'a Atom),
    Neg(&'a Atom),
    Constraint(&'a Expr, &'a Span),
}

pub fn compile(
    inputs: &BTreeMap<String, Vec<ValueType>>,
    sources: &[SourceProgram],
    limits: &ResourceLimits,
) -> Result<CompiledProgram, SclError> {
    let mut compiled = CompiledProgram::default();

    for (name, types) in inputs {
        compiled.relations.insert(
            name.clone(),
            RelationSignature {
                name: name.clone(),
                arity: types.len(),
                types: Some(types.clone()),
                origin: RelationOrigin::Input,
            },
        );
    }

    for source in sources {
        collect_type_decls(&mut compiled, source)?;
    }
    for source in sources {
        collect_facts(&mut compiled, source)?;
        collect_rule_heads(&mut compiled, source)?;
    }

    let mut rules = Vec::new();
    for (idx, source) in sources.iter().enumerate() {
        for rule in source.program.rules() {
            rules.extend(compile_rule(&compiled.relations, idx, source, rule, limits)?);
        }
    }

    compiled.strata = stratify(rules, sources)?;
    Ok(compiled)
}

fn collect_type_decls(
    compiled: &mut CompiledProgram,
    source: &SourceProgram,
) -> Result<(), SclError> {
    for decl in source.program.type_decls() {
        let types = decl.types();
        match compiled.relations.get(&decl.relation) {
            Some(existing) if existing.types.as_ref() == Some(&types) => {}
            Some(existing) => {
                let existing_types = existing
                    .types
                    .as_ref()
                    .map(|t| format_types(t))
                    .unwrap_or_default();
                return Err(SclError::compile(
                    format!(
                        "conflicting type declaration for relation '{}': {} vs {}",
                        decl.relation,
                        format_types(&types),
                        existing_types
                    ),
                    decl.span.clone(),
                    source.source_id.clone(),
                    source.text.clone(),
                ));
            }
            None => {
                compiled.relations.insert(
                    decl.relation.clone(),
                    RelationSignature {
                        name: decl.relation.clone(),
                        arity: types.len(),
                        types: Some(types),
                        origin: RelationOrigin::Declared,
                    },
                );
            }
        }
    }
    Ok(())
}

fn format_types(types: &[ValueType]) -> String {
    let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
    format!("({})", names.join(", "))
}

/// Register a relation use, checking its arity against earlier uses
fn use_relation(
    compiled: &mut CompiledProgram,
    name: &str,
    arity: usize,
    origin: RelationOrigin,
    span: &Span,
    source: &SourceProgram,
) -> Result<(), SclError> {
    match compiled.relations.get_mut(name) {
        Some(signature) => {
            if signature.arity != arity {
                return Err(arity_error(name, signature.arity, arity, span, source));
            }
            if origin == RelationOrigin::Derived && signature.origin == RelationOrigin::Facts {
                signature.origin = RelationOrigin::Derived;
            }
            Ok(())
        }
        None => {
            compiled.relations.insert(
                name.to_string(),
                RelationSignature {
                    name: name.to_string(),
                    arity,
                    types: None,
                    origin,
                },
            );
            Ok(())
        }
    }
}

fn arity_error(
    name: &str,
    expected: usize,
    actual: usize,
    span: &Span,
    source: &SourceProgram,
) -> SclError {
    SclError::compile(
        format!(
            "relation '{}' has arity {} but is used with {} argument(s)",
            name, expected, actual
        ),
        span.clone(),
        source.source_id.clone(),
        source.text.clone(),
    )
}

fn collect_facts(compiled: &mut CompiledProgram, source: &SourceProgram) -> Result<(), SclError> {
    for decl in source.program.fact_decls() {
        for (tag, values) in &decl.facts {
            use_relation(
                compiled,
                &decl.relation,
                values.len(),
                RelationOrigin::Facts,
                &decl.span,
                source,
            )?;
            let signature = &compiled.relations[&decl.relation];
            let tuple = signature.coerce(values.clone()).map_err(|e| {
                SclError::compile(
                    format!("{} in fact {}", e, format_tuple(values)),
                    decl.span.clone(),
                    source.source_id.clone(),
                    source.text.clone(),
                )
            })?;
            compiled.facts.push(ProgramFact {
                relation: decl.relation.clone(),
                tag: *tag,
                tuple,
            });
        }
    }
    Ok(())
}

fn collect_rule_heads(
    compiled: &mut CompiledProgram,
    source: &SourceProgram,
) -> Result<(), SclError> {
    for rule in source.program.rules() {
        use_relation(
            compiled,
            &rule.head.relation,
            rule.head.args.len(),
            RelationOrigin::Derived,
            &rule.head.span,
            source,
        )?;
    }
    Ok(())
}

/// Distribute conjunctions over disjunctions
fn to_dnf<'a>(formula: &'a Formula, max: usize) -> Option<Vec<Vec<Literal<'a>>>> {
    match formula {
        Formula::Atom(atom) => Some(vec![vec![Literal::Pos(atom)]]),
        Formula::Not(atom) => Some(vec![vec![Literal::Neg(atom)]]),
        Formula::Constraint(expr, span) => Some(vec![vec![Literal::Constraint(expr, span)]]),
        Formula::Or(parts) => {
            let mut disjuncts = Vec::new();
            for part in parts {
                disjuncts.extend(to_dnf(part, max)?);
                if disjuncts.len() > max {
                    return None;
                }
            }
            Some(disjuncts)
        }
        Formula::And(parts) => {
            let mut product: Vec<Vec<Literal<'a>>> = vec![Vec::new()];
            for part in parts {
                let options = to_dnf(part, max)?;
                let mut next = Vec::with_capacity(product.len() * options.len());
                for prefix in &product {
                    for option in &options {
                        let mut conjunct = prefix.clone();
                        conjunct.extend(option.iter().cloned());
                        next.push(conjunct);
                    }
                }
                if next.len() > max {
                    return None;
                }
                product = next;
            }
            Some(product)
        }
    }
}

/// Allocates one binding slot per variable name
#[derive(Default)]
struct Slots {
    slots: HashMap<String, usize>,
    bound: Vec<bool>,
}

impl Slots {
    fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = self.bound.len();
        self.slots.insert(name.to_string(), slot);
        self.bound.push(false);
        slot
    }

    fn is_bound(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .map(|&slot| self.bound[slot])
            .unwrap_or(false)
    }

    fn bind(&mut self, name: &str) -> usize {
        let slot = self.slot(name);
        self.bound[slot] = true;
        slot
    }

    fn bound_slot(&self, name: &str) -> Option<usize> {
        self.slots
            .get(name)
            .copied()
            .filter(|&slot| self.bound[slot])
    }
}

fn compile_rule(
    relations: &BTreeMap<String, RelationSignature>,
    source_idx: usize,
    source: &SourceProgram,
    rule: &RuleDecl,
    limits: &ResourceLimits,
) -> Result<Vec<CompiledRule>, SclError> {
    let error = |message: String, span: &Span| {
        SclError::compile(message, span.clone(), source.source_id.clone(), source.text.clone())
    };

    let disjuncts = to_dnf(&rule.body, limits.max_disjuncts).ok_or_else(|| {
        SclError::ResourceLimitExceeded {
            limit_name: "max_disjuncts".to_string(),
            limit_value: limits.max_disjuncts.to_string(),
            actual_value: format!("more than {}", limits.max_disjuncts),
            suggestion: format!(
                "Split the body of rule '{}' into several rules",
                rule.head.relation
            ),
        }
    })?;

    let mut compiled_rules = Vec::with_capacity(disjuncts.len());
    for literals in disjuncts {
        for literal in &literals {
            if let Literal::Pos(atom) | Literal::Neg(atom) = literal {
                let signature = relations.get(&atom.relation).ok_or_else(|| {
                    SclError::compile_with_suggestion(
                        format!("unknown relation '{}'", atom.relation),
                        atom.span.clone(),
                        source.source_id.clone(),
                        source.text.clone(),
                        "declare it with `type`, register it as an input, or define it with a rule",
                    )
                })?;
                if signature.arity != atom.args.len() {
                    return Err(arity_error(
                        &atom.relation,
                        signature.arity,
                        atom.args.len(),
                        &atom.span,
                        source,
                    ));
                }
            }
        }

        let mut slots = Slots::default();
        let body = schedule(relations, &literals, &mut slots).map_err(|(message, span)| {
            error(message, span)
        })?;

        let mut head_args = Vec::with_capacity(rule.head.args.len());
        for arg in &rule.head.args {
            if let Some(unbound) = arg.variables().into_iter().find(|v| !slots.is_bound(v)) {
                return Err(SclError::compile_with_suggestion(
                    format!(
                        "variable '{}' in the head of '{}' is not bound by the body",
                        unbound, rule.head.relation
                    ),
                    rule.head.span.clone(),
                    source.source_id.clone(),
                    source.text.clone(),
                    "every head variable must appear in a positive atom of the body",
                ));
            }
            let expr = CompiledExpr::compile(arg, &mut |name| slots.bound_slot(name))
                .ok_or_else(|| error("cannot compile head expression".to_string(), &rule.head.span))?;
            head_args.push(expr);
        }

        compiled_rules.push(CompiledRule {
            head: rule.head.relation.clone(),
            head_args,
            body,
            num_slots: slots.bound.len(),
            span: rule.span.clone(),
            source: source_idx,
        });
    }
    Ok(compiled_rules)
}

/// Order body literals so that each one only reads bound variables.
///
/// Ready filters, bindings and negations are placed as early as possible;
/// positive atoms keep their source order.
fn schedule<'a>(
    relations: &BTreeMap<String, RelationSignature>,
    literals: &[Literal<'a>],
    slots: &mut Slots,
) -> Result<Vec<BodyStep>, (String, &'a Span)> {
    let mut pending: Vec<Literal<'a>> = literals.to_vec();
    let mut steps = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|lit| match lit {
            Literal::Neg(atom) => atom_vars(atom).iter().all(|v| slots.is_bound(v)),
            Literal::Constraint(expr, _) => constraint_step(expr, slots).is_some(),
            Literal::Pos(_) => false,
        });
        let next = ready.or_else(|| pending.iter().position(|l| matches!(l, Literal::Pos(_))));

        let Some(idx) = next else {
            let (vars, span) = match pending[0] {
                Literal::Neg(atom) => (atom_vars(atom), &atom.span),
                Literal::Constraint(expr, span) => (expr.variables(), span),
                Literal::Pos(atom) => (atom_vars(atom), &atom.span),
            };
            let unbound: Vec<&str> = vars.into_iter().filter(|v| !slots.is_bound(v)).collect();
            return Err((
                format!(
                    "variable(s) {} must be bound by a positive atom before use",
                    unbound
                        .iter()
                        .map(|v| format!("'{}'", v))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                span,
            ));
        };

        let literal = pending.remove(idx);
        let step = match literal {
            Literal::Pos(atom) => {
                let types = relations.get(&atom.relation).and_then(|s| s.types.as_ref());
                let args = atom_patterns(atom, types, slots, true)?;
                BodyStep::Scan {
                    relation: atom.relation.clone(),
                    args,
                }
            }
            Literal::Neg(atom) => {
                let types = relations.get(&atom.relation).and_then(|s| s.types.as_ref());
                let args = atom_patterns(atom, types, slots, false)?;
                BodyStep::Negate {
                    relation: atom.relation.clone(),
                    args,
                }
            }
            Literal::Constraint(expr, span) => match constraint_step(expr, slots) {
                Some(Scheduled::Filter) => {
                    let compiled = CompiledExpr::compile(expr, &mut |n| slots.bound_slot(n))
                        .ok_or(("cannot compile constraint".to_string(), span))?;
                    BodyStep::Filter(compiled)
                }
                Some(Scheduled::Bind(var, value_expr)) => {
                    let compiled = CompiledExpr::compile(value_expr, &mut |n| slots.bound_slot(n))
                        .ok_or(("cannot compile binding".to_string(), span))?;
                    let slot = slots.bind(var);
                    BodyStep::Bind {
                        slot,
                        expr: compiled,
                    }
                }
                None => return Err(("constraint reads unbound variables".to_string(), span)),
            },
        };
        steps.push(step);
    }

    Ok(steps)
}

enum Scheduled<'a> {
    Filter,
    Bind(&'a str, &'a Expr),
}

/// A constraint is a filter once all its variables are bound, or a binding
/// `x == expr` when only `x` is unbound.
fn constraint_step<'a>(expr: &'a Expr, slots: &Slots) -> Option<Scheduled<'a>> {
    if expr.variables().iter().all(|v| slots.is_bound(v)) {
        return Some(Scheduled::Filter);
    }
    if let Expr::Binary(crate::ast::BinaryOp::Eq, left, right) = expr {
        let all_bound = |e: &Expr| e.variables().iter().all(|v| slots.is_bound(v));
        if let Expr::Var(name) = left.as_ref() {
            if !slots.is_bound(name) && all_bound(right) {
                return Some(Scheduled::Bind(name, right));
            }
        }
        if let Expr::Var(name) = right.as_ref() {
            if !slots.is_bound(name) && all_bound(left) {
                return Some(Scheduled::Bind(name, left));
            }
        }
    }
    None
}

fn atom_vars(atom: &Atom) -> Vec<&str> {
    atom.args
        .iter()
        .filter_map(|t| match t {
            Term::Var(name) => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

fn atom_patterns<'a>(
    atom: &'a Atom,
    types: Option<&Vec<ValueType>>,
    slots: &mut Slots,
    binding: bool,
) -> Result<Vec<ArgPattern>, (String, &'a Span)> {
    let mut patterns = Vec::with_capacity(atom.args.len());
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (position, term) in atom.args.iter().enumerate() {
        let pattern = match term {
            Term::Wildcard => ArgPattern::Ignore,
            Term::Const(value) => {
                let value = match types.and_then(|t| t.get(position)) {
                    Some(ty) => ty.coerce(value.clone()).ok_or_else(|| {
                        (
                            format!(
                                "constant {} does not fit argument {} of '{}' ({})",
                                value, position, atom.relation, ty
                            ),
                            &atom.span,
                        )
                    })?,
                    None => value.clone(),
                };
                ArgPattern::Const(value)
            }
            Term::Var(name) => match first_seen.get(name.as_str()) {
                Some(&earlier) => ArgPattern::Same(earlier),
                None => match slots.bound_slot(name) {
                    Some(slot) => ArgPattern::Check(slot),
                    None if binding => {
                        first_seen.insert(name.as_str(), position);
                        ArgPattern::Bind(slots.bind(name))
                    }
                    None => {
                        return Err((
                            format!("variable '{}' in a negated atom is not bound", name),
                            &atom.span,
                        ))
                    }
                },
            },
        };
        patterns.push(pattern);
    }
    Ok(patterns)
}

fn stratify(
    rules: Vec<CompiledRule>,
    sources: &[SourceProgram],
) -> Result<Vec<Stratum>, SclError> {
    let mut graph = DependencyGraph::new();
    for (idx, rule) in rules.iter().enumerate() {
        graph.node(&rule.head);
        for (body, negative) in rule.dependencies() {
            graph.add_dependency(&rule.head, body, negative, idx);
        }
    }

    let mut by_head: HashMap<String, Vec<CompiledRule>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for rule in &rules {
        if !by_head.contains_key(&rule.head) {
            order.push(rule.head.clone());
        }
        by_head.entry(rule.head.clone()).or_default().push(rule.clone());
    }

    let mut strata = Vec::new();
    for component in graph.strongly_connected_components() {
        if let Some((node, dep)) = graph.negative_cycle_edge(&component) {
            let rule = &rules[dep.rule];
            let (source_id, text) = sources
                .get(rule.source)
                .map(|s| (s.source_id.clone(), s.text.clone()))
                .unwrap_or_else(|| ("<input>".to_string(), Arc::from("")));
            return Err(SclError::compile(
                format!(
                    "relation '{}' depends negatively on '{}' within a recursive cycle",
                    graph.name(node),
                    graph.name(dep.target)
                ),
                rule.span.clone(),
                source_id,
                text,
            ));
        }

        let relations: BTreeSet<String> = component
            .iter()
            .map(|&v| graph.name(v).to_string())
            .collect();
        let stratum_rules: Vec<CompiledRule> = order
            .iter()
            .filter(|head| relations.contains(*head))
            .flat_map(|head| by_head.remove(head).unwrap_or_default())
            .collect();
        if stratum_rules.is_empty() {
            continue;
        }
        strata.push(Stratum {
            recursive: graph.is_recursive(&component),
            relations,
            rules: stratum_rules,
        });
    }
    Ok(strata)
}
