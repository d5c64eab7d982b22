//! Fixpoint evaluation of compiled programs
//!
//! Strata run in dependency order. Inside a stratum every rule is
//! re-evaluated against the current relations until no tuple is added and
//! no tag changes (as judged by `Provenance::saturated`). A non-recursive
//! stratum needs a single pass.

pub mod expression;
pub mod relation;
pub mod timeout;

use crate::compiler::{ArgPattern, BodyStep, CompiledProgram, CompiledRule, Stratum};
use crate::error::SclError;
use crate::provenance::Provenance;
use crate::resource_limits::ResourceLimits;
use crate::value::{Tuple, Value};
use relation::Relation;
use std::collections::{BTreeMap, HashMap};
use timeout::TimeoutTracker;

/// Weighted tuples of every relation after evaluation
pub type Results = BTreeMap<String, Vec<(f64, Tuple)>>;

/// Input facts grouped by relation, each with an optional probability
pub type InputFacts = BTreeMap<String, Vec<(Option<f64>, Tuple)>>;

/// How many tuple visits pass between two timeout checks
const TIMEOUT_CHECK_INTERVAL: u64 = 4096;

pub struct Runtime<'a, P: Provenance> {
    provenance: P,
    program: &'a CompiledProgram,
    limits: &'a ResourceLimits,
    tracker: TimeoutTracker,
    visits: u64,
    base: HashMap<String, Relation<P::Tag>>,
    relations: HashMap<String, Relation<P::Tag>>,
}

impl<'a, P: Provenance> Runtime<'a, P> {
    pub fn new(provenance: P, program: &'a CompiledProgram, limits: &'a ResourceLimits) -> Self {
        Self {
            provenance,
            program,
            limits,
            tracker: TimeoutTracker::new(limits),
            visits: 0,
            base: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    /// Tag and store input facts, then program facts
    pub fn load(&mut self, inputs: &InputFacts) {
        for (relation, facts) in inputs {
            for (weight, tuple) in facts {
                self.add_base(relation, *weight, tuple.clone());
            }
        }
        let program = self.program;
        for fact in &program.facts {
            let tag = self.provenance.tagging(fact.tag);
            self.base
                .entry(fact.relation.clone())
                .or_default()
                .insert(&self.provenance, fact.tuple.clone(), tag);
        }
    }

    fn add_base(&mut self, relation: &str, weight: Option<f64>, tuple: Tuple) {
        let tag = self.provenance.tagging(weight);
        self.base
            .entry(relation.to_string())
            .or_default()
            .insert(&self.provenance, tuple, tag);
    }

    pub fn run(mut self) -> Result<Results, SclError> {
        self.relations = self.base.clone();
        let program = self.program;
        for stratum in &program.strata {
            self.run_stratum(stratum)?;
        }
        Ok(self.results())
    }

    fn run_stratum(&mut self, stratum: &Stratum) -> Result<(), SclError> {
        let mut iteration = 0;
        loop {
            iteration += 1;
            if iteration > self.limits.max_iterations {
                return Err(SclError::ResourceLimitExceeded {
                    limit_name: "max_iterations".to_string(),
                    limit_value: self.limits.max_iterations.to_string(),
                    actual_value: iteration.to_string(),
                    suggestion: format!(
                        "Recursive relations {:?} did not reach a fixpoint",
                        stratum.relations
                    ),
                });
            }
            self.tracker.check_timeout()?;

            let mut derived: HashMap<String, Relation<P::Tag>> = HashMap::new();
            for rule in &stratum.rules {
                let mut out = Vec::new();
                let mut env = vec![None; rule.num_slots];
                let one = self.provenance.one();
                self.evaluate_rule(rule, 0, &mut env, one, &mut out)?;
                let target = derived.entry(rule.head.clone()).or_default();
                for (tuple, tag) in out {
                    target.insert(&self.provenance, tuple, tag);
                }
            }

            let mut changed = false;
            for name in &stratum.relations {
                let mut next = self.base.get(name).cloned().unwrap_or_default();
                if let Some(new_tuples) = derived.remove(name) {
                    for (tuple, tag) in new_tuples.into_tuples() {
                        next.insert(&self.provenance, tuple, tag);
                    }
                }
                let previous = self.relations.get(name);
                let mut kept = Relation::default();
                for (tuple, tag) in next.into_tuples() {
                    if self.provenance.discard(&tag) {
                        continue;
                    }
                    match previous.and_then(|rel| rel.get(&tuple)) {
                        Some(old) if self.provenance.saturated(old, &tag) => {}
                        _ => changed = true,
                    }
                    kept.insert(&self.provenance, tuple, tag);
                }
                self.relations.insert(name.clone(), kept);
            }

            if !stratum.recursive || !changed {
                return Ok(());
            }
        }
    }

    fn tick(&mut self) -> Result<(), SclError> {
        self.visits += 1;
        if self.visits % TIMEOUT_CHECK_INTERVAL == 0 {
            self.tracker.check_timeout()?;
        }
        Ok(())
    }

    fn evaluate_rule(
        &mut self,
        rule: &CompiledRule,
        step: usize,
        env: &mut Vec<Option<Value>>,
        tag: P::Tag,
        out: &mut Vec<(Tuple, P::Tag)>,
    ) -> Result<(), SclError> {
        let Some(body_step) = rule.body.get(step) else {
            return self.emit(rule, env, tag, out);
        };

        match body_step {
            BodyStep::Scan { relation, args } => {
                let Some(rel) = self.relations.get(relation) else {
                    return Ok(());
                };
                let matches: Vec<(Tuple, P::Tag)> = rel
                    .iter()
                    .filter(|(tuple, _)| matches_bound(args, tuple, env.as_slice()))
                    .map(|(tuple, tag)| (tuple.clone(), tag.clone()))
                    .collect();
                for (tuple, fact_tag) in matches {
                    self.tick()?;
                    let joined = self.provenance.mult(&tag, &fact_tag);
                    if self.provenance.discard(&joined) {
                        continue;
                    }
                    let saved = env.clone();
                    bind(args, &tuple, env);
                    self.evaluate_rule(rule, step + 1, env, joined, out)?;
                    *env = saved;
                }
                Ok(())
            }
            BodyStep::Negate { relation, args } => {
                let matched = self.relations.get(relation).and_then(|rel| {
                    rel.iter()
                        .filter(|(tuple, _)| matches_bound(args, tuple, env.as_slice()))
                        .map(|(_, tag)| tag.clone())
                        .reduce(|a, b| self.provenance.add(&a, &b))
                });
                let tag = match matched {
                    None => tag,
                    Some(present) => match self.provenance.negate(&present) {
                        Some(absent) => self.provenance.mult(&tag, &absent),
                        None => return Ok(()),
                    },
                };
                if self.provenance.discard(&tag) {
                    return Ok(());
                }
                self.evaluate_rule(rule, step + 1, env, tag, out)
            }
            BodyStep::Filter(expr) => match expr.evaluate(env) {
                Some(Value::Bool(true)) => self.evaluate_rule(rule, step + 1, env, tag, out),
                _ => Ok(()),
            },
            BodyStep::Bind { slot, expr } => {
                let Some(value) = expr.evaluate(env) else {
                    return Ok(());
                };
                let saved = env[*slot].replace(value);
                let result = self.evaluate_rule(rule, step + 1, env, tag, out);
                env[*slot] = saved;
                result
            }
        }
    }

    fn emit(
        &self,
        rule: &CompiledRule,
        env: &[Option<Value>],
        tag: P::Tag,
        out: &mut Vec<(Tuple, P::Tag)>,
    ) -> Result<(), SclError> {
        let mut tuple = Vec::with_capacity(rule.head_args.len());
        for arg in &rule.head_args {
            match arg.evaluate(env) {
                Some(value) => tuple.push(value),
                None => return Ok(()),
            }
        }
        let tuple = match self.program.relations.get(&rule.head) {
            Some(signature) => signature.coerce(tuple)?,
            None => tuple,
        };
        out.push((tuple, tag));
        Ok(())
    }

    fn results(&self) -> Results {
        let mut results = Results::new();
        for name in self.program.relations.keys() {
            results.insert(name.clone(), Vec::new());
        }
        for (name, relation) in &self.relations {
            let weighted = relation
                .iter()
                .map(|(tuple, tag)| (self.provenance.weight(tag), tuple.clone()))
                .collect();
            results.insert(name.clone(), weighted);
        }
        results
    }
}

/// Whether a stored tuple agrees with constants and already bound slots
fn matches_bound(args: &[ArgPattern], tuple: &[Value], env: &[Option<Value>]) -> bool {
    args.iter().zip(tuple).all(|(pattern, value)| match pattern {
        ArgPattern::Const(expected) => expected == value,
        ArgPattern::Check(slot) => env[*slot].as_ref() == Some(value),
        ArgPattern::Same(position) => tuple.get(*position) == Some(value),
        ArgPattern::Bind(_) | ArgPattern::Ignore => true,
    })
}

fn bind(args: &[ArgPattern], tuple: &[Value], env: &mut [Option<Value>]) {
    for (pattern, value) in args.iter().zip(tuple) {
        if let ArgPattern::Bind(slot) = pattern {
            env[*slot] = Some(value.clone());
        }
    }
}

/// Evaluate a compiled program under one provenance
pub fn execute<P: Provenance>(
    provenance: P,
    program: &CompiledProgram,
    inputs: &InputFacts,
    limits: &ResourceLimits,
) -> Result<Results, SclError> {
    let mut runtime = Runtime::new(provenance, program, limits);
    runtime.load(inputs);
    runtime.run()
}
