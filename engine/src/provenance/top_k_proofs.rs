//! Top-k proofs provenance
//!
//! A tag is a formula in disjunctive normal form. Each disjunct is a proof: a
//! conjunction of literals over tagged input facts. Only the `k` most likely
//! proofs are kept. The reported weight is the exact probability of the
//! remaining formula, computed by weighted model counting.

use super::Provenance;
use std::cmp::Ordering;

/// A possibly negated reference to a tagged input fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub fact: usize,
    pub positive: bool,
}

/// A conjunction of literals, sorted by fact id, at most one literal per fact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Proof(pub Vec<Literal>);

impl Proof {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge two proofs; `None` if they assert a fact both ways
    fn conjoin(&self, other: &Proof) -> Option<Proof> {
        let mut merged = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a, b) = (self.0[i], other.0[j]);
            match a.fact.cmp(&b.fact) {
                Ordering::Less => {
                    merged.push(a);
                    i += 1;
                }
                Ordering::Greater => {
                    merged.push(b);
                    j += 1;
                }
                Ordering::Equal => {
                    if a.positive != b.positive {
                        return None;
                    }
                    merged.push(a);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.0[i..]);
        merged.extend_from_slice(&other.0[j..]);
        Some(Proof(merged))
    }

    fn probability(&self, probs: &[f64]) -> f64 {
        self.0
            .iter()
            .map(|lit| {
                let p = probs.get(lit.fact).copied().unwrap_or(1.0);
                if lit.positive {
                    p
                } else {
                    1.0 - p
                }
            })
            .product()
    }
}

/// Disjunction of proofs; the empty formula is `false`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DnfFormula {
    pub proofs: Vec<Proof>,
}

impl DnfFormula {
    pub fn is_false(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn is_true(&self) -> bool {
        self.proofs.iter().any(Proof::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct TopKProofsProvenance {
    k: usize,
    probs: Vec<f64>,
}

impl TopKProofsProvenance {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            probs: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Probability of an input fact variable
    pub fn fact_probability(&self, fact: usize) -> Option<f64> {
        self.probs.get(fact).copied()
    }

    /// Deduplicate, rank by proof probability and keep the best `k`
    fn top_k(&self, mut proofs: Vec<Proof>) -> DnfFormula {
        proofs.sort();
        proofs.dedup();
        if proofs.len() > self.k {
            let mut ranked: Vec<(f64, Proof)> = proofs
                .into_iter()
                .map(|p| (p.probability(&self.probs), p))
                .collect();
            ranked.sort_by(|(pa, a), (pb, b)| pb.total_cmp(pa).then_with(|| a.cmp(b)));
            ranked.truncate(self.k);
            proofs = ranked.into_iter().map(|(_, p)| p).collect();
            proofs.sort();
        }
        DnfFormula { proofs }
    }

    fn model_count(&self, proofs: &[Proof]) -> f64 {
        if proofs.is_empty() {
            return 0.0;
        }
        if proofs.iter().any(Proof::is_empty) {
            return 1.0;
        }

        let fact = proofs[0].0[0].fact;
        let p = self.probs.get(fact).copied().unwrap_or(1.0);
        let when_true = condition(proofs, fact, true);
        let when_false = condition(proofs, fact, false);
        p * self.model_count(&when_true) + (1.0 - p) * self.model_count(&when_false)
    }
}

/// Restrict a DNF to an assignment of one fact
fn condition(proofs: &[Proof], fact: usize, value: bool) -> Vec<Proof> {
    proofs
        .iter()
        .filter_map(|proof| match proof.0.iter().position(|l| l.fact == fact) {
            None => Some(proof.clone()),
            Some(idx) if proof.0[idx].positive == value => {
                let mut rest = proof.0.clone();
                rest.remove(idx);
                Some(Proof(rest))
            }
            Some(_) => None,
        })
        .collect()
}

impl Provenance for TopKProofsProvenance {
    type Tag = DnfFormula;

    fn name(&self) -> &'static str {
        "topkproofs"
    }

    fn tagging(&mut self, weight: Option<f64>) -> Self::Tag {
        match weight {
            None => self.one(),
            Some(p) => {
                let fact = self.probs.len();
                self.probs.push(p);
                DnfFormula {
                    proofs: vec![Proof(vec![Literal {
                        fact,
                        positive: true,
                    }])],
                }
            }
        }
    }

    fn zero(&self) -> Self::Tag {
        DnfFormula::default()
    }

    fn one(&self) -> Self::Tag {
        DnfFormula {
            proofs: vec![Proof::default()],
        }
    }

    fn add(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        let mut proofs = a.proofs.clone();
        proofs.extend(b.proofs.iter().cloned());
        self.top_k(proofs)
    }

    fn mult(&self, a: &Self::Tag, b: &Self::Tag) -> Self::Tag {
        let mut proofs = Vec::with_capacity(a.proofs.len() * b.proofs.len());
        for pa in &a.proofs {
            for pb in &b.proofs {
                if let Some(p) = pa.conjoin(pb) {
                    proofs.push(p);
                }
            }
        }
        self.top_k(proofs)
    }

    /// De Morgan: every proof contributes a clause of negated literals, and
    /// the clauses are multiplied back into DNF.
    fn negate(&self, tag: &Self::Tag) -> Option<Self::Tag> {
        let mut result = self.one();
        for proof in &tag.proofs {
            let clause = DnfFormula {
                proofs: proof
                    .0
                    .iter()
                    .map(|lit| {
                        Proof(vec![Literal {
                            fact: lit.fact,
                            positive: !lit.positive,
                        }])
                    })
                    .collect(),
            };
            result = self.mult(&result, &clause);
            if result.is_false() {
                return None;
            }
        }
        Some(result)
    }

    fn discard(&self, tag: &Self::Tag) -> bool {
        tag.is_false()
    }

    fn saturated(&self, old: &Self::Tag, new: &Self::Tag) -> bool {
        old == new
    }

    fn weight(&self, tag: &Self::Tag) -> f64 {
        self.model_count(&tag.proofs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_untagged_fact_is_certain() {
        let mut prov = TopKProofsProvenance::new(3);
        let tag = prov.tagging(None);
        assert!(tag.is_true());
        assert_eq!(prov.weight(&tag), 1.0);
    }

    #[test]
    fn test_disjunction_uses_model_counting() {
        let mut prov = TopKProofsProvenance::new(3);
        let a = prov.tagging(Some(0.5));
        let b = prov.tagging(Some(0.5));
        let either = prov.add(&a, &b);
        // 1 - (1 - 0.5) * (1 - 0.5)
        assert!(approx(prov.weight(&either), 0.75));
    }

    #[test]
    fn test_shared_fact_is_not_double_counted() {
        let mut prov = TopKProofsProvenance::new(3);
        let a = prov.tagging(Some(0.5));
        let b = prov.tagging(Some(0.4));
        let ab = prov.mult(&a, &b);
        let tag = prov.add(&a, &ab);
        assert!(approx(prov.weight(&tag), 0.5));
    }

    #[test]
    fn test_keeps_only_k_best_proofs() {
        let mut prov = TopKProofsProvenance::new(1);
        let low = prov.tagging(Some(0.1));
        let high = prov.tagging(Some(0.9));
        let tag = prov.add(&low, &high);
        assert_eq!(tag.proofs.len(), 1);
        assert!(approx(prov.weight(&tag), 0.9));
    }

    #[test]
    fn test_conflicting_literals_cancel() {
        let mut prov = TopKProofsProvenance::new(3);
        let a = prov.tagging(Some(0.3));
        let not_a = prov.negate(&a).unwrap();
        assert!(approx(prov.weight(&not_a), 0.7));
        assert!(prov.discard(&prov.mult(&a, &not_a)));
    }

    #[test]
    fn test_negating_a_certain_fact_removes_derivation() {
        let prov = TopKProofsProvenance::new(3);
        assert_eq!(prov.negate(&prov.one()), None);
        assert_eq!(prov.negate(&prov.zero()), Some(prov.one()));
    }
}
