use super::Provenance;

const EPSILON: f64 = 1e-12;

/// Max over alternatives, min over joins
#[derive(Debug, Clone, Default)]
pub struct MinMaxProbProvenance;

impl Provenance for MinMaxProbProvenance {
    type Tag = f64;

    fn name(&self) -> &'static str {
        "minmaxprob"
    }

    fn tagging(&mut self, weight: Option<f64>) -> Self::Tag {
        weight.unwrap_or(1.0)
    }

    fn zero(&self) -> Self::Tag {
        0.0
    }

    fn one(&self) -> Self::Tag {
        1.0
    }

    fn add(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        a.max(*b)
    }

    fn mult(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        a.min(*b)
    }

    fn negate(&self, tag: &Self::Tag) -> Option<Self::Tag> {
        Some(1.0 - tag)
    }

    fn discard(&self, tag: &Self::Tag) -> bool {
        *tag <= EPSILON
    }

    fn saturated(&self, old: &Self::Tag, new: &Self::Tag) -> bool {
        (old - new).abs() <= EPSILON
    }

    fn weight(&self, tag: &Self::Tag) -> f64 {
        *tag
    }
}

/// Clamped sum over alternatives, product over joins
///
/// Only newly derived tuples drive the fixpoint; updated probabilities of
/// existing tuples do not trigger another iteration.
#[derive(Debug, Clone, Default)]
pub struct AddMultProbProvenance;

impl Provenance for AddMultProbProvenance {
    type Tag = f64;

    fn name(&self) -> &'static str {
        "addmultprob"
    }

    fn tagging(&mut self, weight: Option<f64>) -> Self::Tag {
        weight.unwrap_or(1.0)
    }

    fn zero(&self) -> Self::Tag {
        0.0
    }

    fn one(&self) -> Self::Tag {
        1.0
    }

    fn add(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        (a + b).min(1.0)
    }

    fn mult(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        a * b
    }

    fn negate(&self, tag: &Self::Tag) -> Option<Self::Tag> {
        Some(1.0 - tag)
    }

    fn discard(&self, tag: &Self::Tag) -> bool {
        *tag <= EPSILON
    }

    fn saturated(&self, _old: &Self::Tag, _new: &Self::Tag) -> bool {
        true
    }

    fn weight(&self, tag: &Self::Tag) -> f64 {
        *tag
    }
}
