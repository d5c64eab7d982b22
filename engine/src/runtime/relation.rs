use crate::provenance::Provenance;
use crate::value::{Tuple, Value};
use std::collections::BTreeMap;

/// Tagged tuples of one relation, kept in ascending tuple order
#[derive(Debug, Clone)]
pub struct Relation<T> {
    tuples: BTreeMap<Tuple, T>,
}

impl<T> Default for Relation<T> {
    fn default() -> Self {
        Self {
            tuples: BTreeMap::new(),
        }
    }
}

impl<T: Clone> Relation<T> {
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn get(&self, tuple: &[Value]) -> Option<&T> {
        self.tuples.get(tuple)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tuple, &T)> {
        self.tuples.iter()
    }

    /// Insert a tuple, combining with an existing tag through `add`
    pub fn insert<P: Provenance<Tag = T>>(&mut self, provenance: &P, tuple: Tuple, tag: T) {
        match self.tuples.get_mut(&tuple) {
            Some(existing) => *existing = provenance.add(existing, &tag),
            None => {
                self.tuples.insert(tuple, tag);
            }
        }
    }

    pub fn into_tuples(self) -> impl Iterator<Item = (Tuple, T)> {
        self.tuples.into_iter()
    }
}
