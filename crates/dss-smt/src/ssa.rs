//! Variable-versioning map.

use crate::term::Var;
use std::collections::BTreeMap;

/// Current SSA index per program variable. Absent variables are at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SsaMap {
    indices: BTreeMap<Var, i64>,
}

impl SsaMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn index(&self, var: &Var) -> i64 {
        self.indices.get(var).copied().unwrap_or(0)
    }

    /// Advance `var` to a fresh index and return it.
    pub fn bump(&mut self, var: &Var) -> i64 {
        let next = self.index(var) + 1;
        self.indices.insert(var.clone(), next);
        next
    }

    pub fn set(&mut self, var: &Var, index: i64) {
        if index == 0 {
            self.indices.remove(var);
        } else {
            self.indices.insert(var.clone(), index);
        }
    }

    /// Pointwise maximum of two maps.
    pub fn join(&self, other: &SsaMap) -> SsaMap {
        let mut out = self.clone();
        for (var, &idx) in &other.indices {
            if idx > out.index(var) {
                out.indices.insert(var.clone(), idx);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, i64)> {
        self.indices.iter().map(|(v, &i)| (v, i))
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
