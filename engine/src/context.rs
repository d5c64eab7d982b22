use crate::compiler::{compile, CompiledProgram, SourceProgram};
use crate::parser::parse;
use crate::provenance::{
    AddMultProbProvenance, MinMaxProbProvenance, ProvenanceMode, TopKProofsProvenance,
    UnitProvenance,
};
use crate::runtime::{execute, InputFacts, Results};
use crate::value::{Tuple, ValueType};
use crate::{ResourceLimits, SclError, SclResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// An evaluation context.
///
/// Relations are registered with their column types, facts are added to
/// them, program text is loaded, and `run` evaluates everything under the
/// context's provenance. Results stay available until the context changes.
pub struct Context {
    mode: ProvenanceMode,
    limits: ResourceLimits,
    inputs: BTreeMap<String, Vec<ValueType>>,
    facts: InputFacts,
    fact_count: usize,
    sources: Vec<SourceProgram>,
    compiled: Option<CompiledProgram>,
    results: Option<Results>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ProvenanceMode::default())
    }
}

impl Context {
    pub fn new(mode: ProvenanceMode) -> Self {
        Self::with_limits(mode, ResourceLimits::default())
    }

    /// Create a context with custom resource limits
    pub fn with_limits(mode: ProvenanceMode, limits: ResourceLimits) -> Self {
        Self {
            mode,
            limits,
            inputs: BTreeMap::new(),
            facts: InputFacts::new(),
            fact_count: 0,
            sources: Vec::new(),
            compiled: None,
            results: None,
        }
    }

    pub fn provenance(&self) -> ProvenanceMode {
        self.mode
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Register an input relation with its column types
    pub fn add_relation(&mut self, name: &str, types: &[ValueType]) -> SclResult<()> {
        if !is_relation_name(name) {
            return Err(SclError::Engine(format!(
                "'{}' is not a valid relation name",
                name
            )));
        }
        if self.inputs.contains_key(name) {
            return Err(SclError::DuplicateRelation(name.to_string()));
        }
        self.inputs.insert(name.to_string(), types.to_vec());
        self.facts.entry(name.to_string()).or_default();
        self.invalidate();
        Ok(())
    }

    /// Add facts to a registered relation.
    ///
    /// Every tuple must match the relation's arity and column types; a tag,
    /// when present, must be a probability in `[0, 1]`. The batch is
    /// rejected as a whole on the first invalid fact.
    pub fn add_facts(&mut self, name: &str, facts: Vec<(Option<f64>, Tuple)>) -> SclResult<()> {
        let types = self
            .inputs
            .get(name)
            .ok_or_else(|| SclError::UnknownRelation(name.to_string()))?;

        let total = self.fact_count + facts.len();
        if total > self.limits.max_facts {
            return Err(SclError::ResourceLimitExceeded {
                limit_name: "max_facts".to_string(),
                limit_value: self.limits.max_facts.to_string(),
                actual_value: total.to_string(),
                suggestion: "Send fewer facts per request".to_string(),
            });
        }

        let mut checked = Vec::with_capacity(facts.len());
        for (tag, tuple) in facts {
            if let Some(p) = tag {
                if !(0.0..=1.0).contains(&p) {
                    return Err(SclError::Engine(format!(
                        "tag {} of a fact in '{}' is not a probability in [0, 1]",
                        p, name
                    )));
                }
            }
            if tuple.len() != types.len() {
                return Err(SclError::ArityMismatch {
                    relation: name.to_string(),
                    expected: types.len(),
                    actual: tuple.len(),
                });
            }
            let mut row = Vec::with_capacity(tuple.len());
            for (position, (value, ty)) in tuple.into_iter().zip(types).enumerate() {
                let found = value.value_type();
                let value = ty.coerce(value).ok_or_else(|| SclError::TypeMismatch {
                    relation: name.to_string(),
                    position,
                    expected: *ty,
                    found: found.to_string(),
                })?;
                row.push(value);
            }
            checked.push((tag, row));
        }

        self.fact_count = total;
        self.facts.entry(name.to_string()).or_default().extend(checked);
        self.invalidate();
        Ok(())
    }

    /// Load program text
    pub fn add_program(&mut self, text: &str) -> SclResult<()> {
        let source_id = if self.sources.is_empty() {
            "<program>".to_string()
        } else {
            format!("<program {}>", self.sources.len() + 1)
        };
        self.add_program_with_id(text, &source_id)
    }

    /// Load program text, naming its source in error reports
    pub fn add_program_with_id(&mut self, text: &str, source_id: &str) -> SclResult<()> {
        let program = parse(text, Some(source_id.to_string()), &self.limits)?;
        self.sources.push(SourceProgram {
            source_id: source_id.to_string(),
            text: Arc::from(text),
            program,
        });
        self.invalidate();
        Ok(())
    }

    /// Load a program from a file
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> SclResult<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        self.add_program_with_id(&text, &path.display().to_string())
    }

    /// Compile without evaluating, reporting static errors
    pub fn compile(&mut self) -> SclResult<&CompiledProgram> {
        let compiled = compile(&self.inputs, &self.sources, &self.limits)?;
        Ok(self.compiled.insert(compiled))
    }

    /// Compile and evaluate everything loaded so far
    pub fn run(&mut self) -> SclResult<()> {
        let compiled = compile(&self.inputs, &self.sources, &self.limits)?;
        let results = match self.mode {
            ProvenanceMode::Unit => execute(UnitProvenance, &compiled, &self.facts, &self.limits),
            ProvenanceMode::MinMaxProb => {
                execute(MinMaxProbProvenance, &compiled, &self.facts, &self.limits)
            }
            ProvenanceMode::AddMultProb => {
                execute(AddMultProbProvenance, &compiled, &self.facts, &self.limits)
            }
            ProvenanceMode::TopKProofs { k } => execute(
                TopKProofsProvenance::new(k),
                &compiled,
                &self.facts,
                &self.limits,
            ),
        }?;
        self.compiled = Some(compiled);
        self.results = Some(results);
        Ok(())
    }

    /// Weighted tuples of a relation, in ascending tuple order
    pub fn relation(&self, name: &str) -> SclResult<&[(f64, Tuple)]> {
        let results = self.results.as_ref().ok_or_else(|| {
            SclError::Engine("the context has not been run since it last changed".to_string())
        })?;
        results
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SclError::UnknownRelation(name.to_string()))
    }

    /// Whether the name refers to a registered, declared or derived relation
    pub fn has_relation(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
            || self
                .compiled
                .as_ref()
                .map(|c| c.relations.contains_key(name))
                .unwrap_or(false)
    }

    /// Names of every relation known after the last compile or run
    pub fn relation_names(&self) -> Vec<String> {
        match &self.compiled {
            Some(compiled) => compiled.relations.keys().cloned().collect(),
            None => self.inputs.keys().cloned().collect(),
        }
    }

    fn invalidate(&mut self) {
        self.compiled = None;
        self.results = None;
    }
}

/// Relation names start with a letter or `_` and continue with word characters
pub fn is_relation_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
