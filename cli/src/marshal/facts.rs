//! Conversion of JSON facts into typed engine tuples

use super::types::TypeTag;
use crate::error::RunError;
use scl::{Tuple, Value};
use serde::Deserialize;
use serde_json::Value as Json;

/// Name and resolved argument types of an input relation
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSchema {
    pub name: String,
    pub args: Vec<(Option<String>, TypeTag)>,
}

impl RelationSchema {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn value_types(&self) -> Vec<scl::ValueType> {
        self.args.iter().map(|(_, tag)| tag.value_type()).collect()
    }
}

/// A fact as it arrives: `[tagOrNull, [value, ...]]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawFact(pub Json, pub Vec<Json>);

/// A fact ready for the engine
pub type Fact = (Option<f64>, Tuple);

/// Convert raw facts positionally into the schema's types.
///
/// Duplicates are passed through unchanged.
pub fn marshal(schema: &RelationSchema, raw_facts: &[RawFact]) -> Result<Vec<Fact>, RunError> {
    raw_facts
        .iter()
        .enumerate()
        .map(|(index, RawFact(tag, values))| {
            let tag = marshal_tag(schema, index, tag)?;
            if values.len() != schema.arity() {
                return Err(RunError::SchemaMismatch(format!(
                    "fact {} of relation '{}' has {} value(s) but the relation declares {} argument(s)",
                    index,
                    schema.name,
                    values.len(),
                    schema.arity()
                )));
            }
            let tuple = values
                .iter()
                .zip(&schema.args)
                .enumerate()
                .map(|(position, (raw, (_, tag)))| {
                    coerce(raw, *tag).ok_or_else(|| {
                        RunError::TypeCoercionError(format!(
                            "argument {} of fact {} in relation '{}' expects {}, got {}",
                            position, index, schema.name, tag, raw
                        ))
                    })
                })
                .collect::<Result<Tuple, RunError>>()?;
            Ok((tag, tuple))
        })
        .collect()
}

fn marshal_tag(schema: &RelationSchema, index: usize, tag: &Json) -> Result<Option<f64>, RunError> {
    match tag {
        Json::Null => Ok(None),
        Json::Number(n) => match n.as_f64() {
            Some(p) if (0.0..=1.0).contains(&p) => Ok(Some(p)),
            _ => Err(RunError::TypeCoercionError(format!(
                "tag {} of fact {} in relation '{}' is not a probability in [0, 1]",
                n, index, schema.name
            ))),
        },
        other => Err(RunError::TypeCoercionError(format!(
            "tag of fact {} in relation '{}' must be a number or null, got {}",
            index, schema.name, other
        ))),
    }
}

/// Lossless conversion of one JSON value
pub fn coerce(raw: &Json, tag: TypeTag) -> Option<Value> {
    match (tag, raw) {
        (TypeTag::String, Json::String(s)) => Some(Value::string(s)),
        (TypeTag::Boolean, Json::Bool(b)) => Some(Value::Bool(*b)),
        (TypeTag::Float, Json::Number(n)) => n.as_f64().map(Value::F64),
        (TypeTag::Integer, Json::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return i32::try_from(i).ok().map(Value::I32);
            }
            let f = n.as_f64()?;
            let fits = f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64;
            fits.then_some(Value::I32(f as i32))
        }
        _ => None,
    }
}
