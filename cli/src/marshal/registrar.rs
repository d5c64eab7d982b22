use super::facts::{Fact, RelationSchema};
use crate::error::RunError;
use scl::{Context, SclError};

/// Declare an input relation on the context, then load its facts
pub fn register(ctx: &mut Context, schema: &RelationSchema, facts: Vec<Fact>) -> Result<(), RunError> {
    let timeout_ms = ctx.limits().max_evaluation_time_ms;
    ctx.add_relation(&schema.name, &schema.value_types())
        .map_err(|e| match e {
            SclError::Engine(message) => RunError::BadRequest(message),
            other => RunError::from_engine(other, timeout_ms),
        })?;
    ctx.add_facts(&schema.name, facts)
        .map_err(|e| RunError::from_engine(e, timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::types::TypeTag;
    use scl::{ProvenanceMode, Value};

    fn schema() -> RelationSchema {
        RelationSchema {
            name: "parent".to_string(),
            args: vec![
                (Some("a".to_string()), TypeTag::String),
                (Some("b".to_string()), TypeTag::String),
            ],
        }
    }

    #[test]
    fn test_register_declares_and_loads() {
        let mut ctx = Context::new(ProvenanceMode::Unit);
        let facts = vec![(None, vec![Value::string("Emily"), Value::string("Bob")])];
        register(&mut ctx, &schema(), facts).unwrap();
        ctx.run().unwrap();
        assert_eq!(ctx.relation("parent").unwrap().len(), 1);
    }

    #[test]
    fn test_second_declaration_is_duplicate() {
        let mut ctx = Context::new(ProvenanceMode::Unit);
        register(&mut ctx, &schema(), Vec::new()).unwrap();
        let err = register(&mut ctx, &schema(), Vec::new()).unwrap_err();
        assert!(matches!(err, RunError::DuplicateRelation(name) if name == "parent"));
    }
}
