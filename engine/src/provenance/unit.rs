use super::Provenance;

/// Plain Datalog: a tuple is either derived or not
#[derive(Debug, Clone, Default)]
pub struct UnitProvenance;

impl Provenance for UnitProvenance {
    type Tag = ();

    fn name(&self) -> &'static str {
        "unit"
    }

    fn tagging(&mut self, _weight: Option<f64>) -> Self::Tag {}

    fn zero(&self) -> Self::Tag {}

    fn one(&self) -> Self::Tag {}

    fn add(&self, _a: &Self::Tag, _b: &Self::Tag) -> Self::Tag {}

    fn mult(&self, _a: &Self::Tag, _b: &Self::Tag) -> Self::Tag {}

    fn negate(&self, _tag: &Self::Tag) -> Option<Self::Tag> {
        None
    }

    fn discard(&self, _tag: &Self::Tag) -> bool {
        false
    }

    fn saturated(&self, _old: &Self::Tag, _new: &Self::Tag) -> bool {
        true
    }

    fn weight(&self, _tag: &Self::Tag) -> f64 {
        1.0
    }
}
