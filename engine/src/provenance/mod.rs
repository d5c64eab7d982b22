//! Provenance semirings
//!
//! Every tuple in the runtime carries a tag. Joins combine tags with `mult`,
//! alternative derivations of the same tuple combine with `add`, and
//! `weight` turns the final tag into the number reported to callers.

pub mod probability;
pub mod top_k_proofs;
pub mod unit;

pub use probability::{AddMultProbProvenance, MinMaxProbProvenance};
pub use top_k_proofs::{DnfFormula, Literal, Proof, TopKProofsProvenance};
pub use unit::UnitProvenance;

use std::fmt;
use std::str::FromStr;

pub trait Provenance {
    type Tag: Clone + fmt::Debug + PartialEq;

    fn name(&self) -> &'static str;

    /// Tag an input fact. `None` means the fact is certain.
    fn tagging(&mut self, weight: Option<f64>) -> Self::Tag;

    fn zero(&self) -> Self::Tag;

    fn one(&self) -> Self::Tag;

    fn add(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag;

    fn mult(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag;

    /// Tag of `not t`. `None` removes the derivation entirely.
    fn negate(&self, tag: &Self::Tag) -> Option<Self::Tag>;

    /// Whether a tuple with this tag should be dropped
    fn discard(&self, tag: &Self::Tag) -> bool;

    /// Whether replacing `old` by `new` counts as a change for the fixpoint
    fn saturated(&self, old: &Self::Tag, new: &Self::Tag) -> bool;

    fn weight(&self, tag: &Self::Tag) -> f64;
}

/// Provenance selected for a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvenanceMode {
    Unit,
    MinMaxProb,
    AddMultProb,
    TopKProofs { k: usize },
}

impl ProvenanceMode {
    pub const DEFAULT_K: usize = 3;

    pub fn name(&self) -> &'static str {
        match self {
            ProvenanceMode::Unit => "unit",
            ProvenanceMode::MinMaxProb => "minmaxprob",
            ProvenanceMode::AddMultProb => "addmultprob",
            ProvenanceMode::TopKProofs { .. } => "topkproofs",
        }
    }

    /// Build a mode from its name and an optional k (only meaningful for top-k proofs)
    pub fn from_name(name: &str, k: Option<usize>) -> Result<Self, String> {
        match name {
            "unit" => Ok(ProvenanceMode::Unit),
            "minmaxprob" => Ok(ProvenanceMode::MinMaxProb),
            "addmultprob" => Ok(ProvenanceMode::AddMultProb),
            "topkproofs" => {
                let k = k.unwrap_or(Self::DEFAULT_K);
                if k == 0 {
                    return Err("k must be a positive integer".to_string());
                }
                Ok(ProvenanceMode::TopKProofs { k })
            }
            other => Err(format!(
                "unsupported provenance '{}' (expected one of: unit, minmaxprob, addmultprob, topkproofs)",
                other
            )),
        }
    }
}

impl Default for ProvenanceMode {
    fn default() -> Self {
        ProvenanceMode::TopKProofs {
            k: Self::DEFAULT_K,
        }
    }
}

impl fmt::Display for ProvenanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvenanceMode::TopKProofs { k } => write!(f, "topkproofs(k={})", k),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ProvenanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, None)
    }
}
