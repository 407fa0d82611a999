use std::collections::{HashMap, HashSet};

use crate::dataflow::value::Value;
use crate::ir::stmt::VarIdx;

/// Constant-propagation fact: a total map from variables to lattice values
/// where an absent key reads as `Undef`. `Undef` is therefore never stored,
/// which keeps structural equality aligned with lattice equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpFact {
    map: HashMap<VarIdx, Value>,
}

impl CpFact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, v: VarIdx) -> Value {
        self.map.get(&v).copied().unwrap_or(Value::Undef)
    }

    /// Bind `v` to `value`; returns whether the fact changed.
    pub fn update(&mut self, v: VarIdx, value: Value) -> bool {
        if value.is_undef() {
            return self.map.remove(&v).is_some();
        }
        self.map.insert(v, value) != Some(value)
    }

    pub fn remove(&mut self, v: VarIdx) {
        self.map.remove(&v);
    }

    /// Merge every binding of `other` into `self` (no removals — during the
    /// fixpoint bindings only strengthen toward Nac). Returns changed.
    pub fn copy_from(&mut self, other: &CpFact) -> bool {
        let mut changed = false;
        for (&v, &value) in &other.map {
            changed |= self.update(v, value);
        }
        changed
    }

    /// Pointwise meet of `other` into `self`.
    pub fn meet_from(&mut self, other: &CpFact) -> bool {
        let mut changed = false;
        for (&v, &value) in &other.map {
            changed |= self.update(v, value.meet(self.get(v)));
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarIdx, Value)> + '_ {
        self.map.iter().map(|(&v, &value)| (v, value))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Set fact used by liveness: the variables live at a point.
pub type LiveSet = HashSet<VarIdx>;

/// Per-node IN/OUT facts produced by a solver run, indexed by CFG node.
#[derive(Debug)]
pub struct DataflowResult<F> {
    pub in_facts: Vec<F>,
    pub out_facts: Vec<F>,
}

impl<F> DataflowResult<F> {
    pub fn in_fact(&self, node: usize) -> &F {
        &self.in_facts[node]
    }

    pub fn out_fact(&self, node: usize) -> &F {
        &self.out_facts[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_reads_as_undef() {
        let fact = CpFact::new();
        assert_eq!(fact.get(7), Value::Undef);
    }

    #[test]
    fn updating_to_undef_erases_the_binding() {
        let mut fact = CpFact::new();
        assert!(fact.update(0, Value::Const(4)));
        assert!(fact.update(0, Value::Undef));
        assert!(fact.is_empty());
        // second erase is a no-op
        assert!(!fact.update(0, Value::Undef));
    }

    #[test]
    fn meet_from_is_pointwise() {
        let mut a = CpFact::new();
        a.update(0, Value::Const(1));
        a.update(1, Value::Const(2));
        let mut b = CpFact::new();
        b.update(0, Value::Const(1));
        b.update(1, Value::Const(3));
        assert!(a.meet_from(&b));
        assert_eq!(a.get(0), Value::Const(1));
        assert_eq!(a.get(1), Value::Nac);
    }
}
