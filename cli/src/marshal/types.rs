//! Declared argument types and their engine counterparts

use crate::error::RunError;
use scl::ValueType;
use std::fmt;
use std::str::FromStr;

/// The argument types a request may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Boolean,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::String => "String",
            TypeTag::Integer => "Integer",
            TypeTag::Float => "Float",
            TypeTag::Boolean => "Boolean",
        }
    }

    /// Engine column type backing this tag
    pub fn value_type(&self) -> ValueType {
        match self {
            TypeTag::String => ValueType::String,
            TypeTag::Integer => ValueType::I32,
            TypeTag::Float => ValueType::F64,
            TypeTag::Boolean => ValueType::Bool,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(TypeTag::String),
            "Integer" => Ok(TypeTag::Integer),
            "Float" => Ok(TypeTag::Float),
            "Boolean" => Ok(TypeTag::Boolean),
            _ => Err(()),
        }
    }
}

/// Resolve a declared type string for argument `position` of `relation`
pub fn resolve(relation: &str, position: usize, declared: &str) -> Result<TypeTag, RunError> {
    declared.parse().map_err(|_| {
        RunError::UnknownType(format!(
            "argument {} of relation '{}' has unknown type '{}' (expected String, Integer, Float or Boolean)",
            position, relation, declared
        ))
    })
}
