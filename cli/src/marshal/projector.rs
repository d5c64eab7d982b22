use crate::error::RunError;
use scl::{Context, Tuple};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::collections::BTreeMap;

/// One derived tuple with its provenance weight, serialized as `[weight, [v, ...]]`
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedTuple {
    pub weight: f64,
    pub values: Tuple,
}

impl Serialize for EvaluatedTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.weight)?;
        pair.serialize_element(&self.values)?;
        pair.end()
    }
}

/// Output relation name to its tuples
pub type Projection = BTreeMap<String, Vec<EvaluatedTuple>>;

/// Read the requested relations from an evaluated context
pub fn project<'a>(
    ctx: &Context,
    outputs: impl IntoIterator<Item = &'a str>,
) -> Result<Projection, RunError> {
    let timeout_ms = ctx.limits().max_evaluation_time_ms;
    let mut projection = Projection::new();
    for name in outputs {
        let tuples = ctx
            .relation(name)
            .map_err(|e| RunError::from_engine(e, timeout_ms))?
            .iter()
            .map(|(weight, values)| EvaluatedTuple {
                weight: *weight,
                values: values.clone(),
            })
            .collect();
        projection.insert(name.to_string(), tuples);
    }
    Ok(projection)
}
