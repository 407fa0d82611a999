use std::collections::HashMap;

use crate::ir::stmt::{MethodIdx, StmtIdx};
use crate::pta::heap::ObjId;

/// Interned context id. Id 0 is always the empty context.
pub type CtxId = usize;

/// One element of a context tuple: a call site or a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtxElem {
    CallSite(StmtIdx),
    Obj(ObjId),
}

/// Structural interning of context tuples. Equality of `CtxId`s is exactly
/// structural equality of the tuples, which is what every CS map keys on.
#[derive(Debug)]
pub struct ContextTable {
    ids: HashMap<Vec<CtxElem>, CtxId>,
    elems: Vec<Vec<CtxElem>>,
}

impl Default for ContextTable {
    fn default() -> Self {
        let mut table = Self {
            ids: HashMap::new(),
            elems: Vec::new(),
        };
        table.intern(Vec::new()); // id 0 = empty context
        table
    }
}

impl ContextTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty(&self) -> CtxId {
        0
    }

    pub fn intern(&mut self, elems: Vec<CtxElem>) -> CtxId {
        if let Some(&id) = self.ids.get(&elems) {
            return id;
        }
        let id = self.elems.len();
        self.ids.insert(elems.clone(), id);
        self.elems.push(elems);
        id
    }

    pub fn elems(&self, ctx: CtxId) -> &[CtxElem] {
        &self.elems[ctx]
    }

    /// Append `elem` to `base`, keeping only the last `k` elements.
    pub fn append_k(&mut self, base: CtxId, elem: CtxElem, k: usize) -> CtxId {
        let mut elems = self.elems[base].to_vec();
        elems.push(elem);
        let keep = elems.len().saturating_sub(k);
        self.intern(elems.split_off(keep))
    }

    /// Keep only the last `k` elements of `base`.
    pub fn truncate_k(&mut self, base: CtxId, k: usize) -> CtxId {
        let len = self.elems[base].len();
        if len <= k {
            return base;
        }
        let elems = self.elems[base][len - k..].to_vec();
        self.intern(elems)
    }
}

/// Context abstraction policy of the context-sensitive solver.
///
/// Selectors must be pure functions of their arguments: same inputs, same
/// context, no hidden state. Bounded tuple length is part of the contract —
/// it is what makes the fixpoint finite.
pub trait ContextSelector {
    /// Callee context for a static call site.
    fn select_static(
        &self,
        ctxs: &mut ContextTable,
        caller_ctx: CtxId,
        site: StmtIdx,
        callee: MethodIdx,
    ) -> CtxId;

    /// Callee context for an instance call with the given receiver.
    #[allow(clippy::too_many_arguments)]
    fn select_instance(
        &self,
        ctxs: &mut ContextTable,
        caller_ctx: CtxId,
        site: StmtIdx,
        recv_ctx: CtxId,
        recv_obj: ObjId,
        callee: MethodIdx,
    ) -> CtxId;

    /// Heap context for an allocation inside a method analyzed under
    /// `method_ctx`.
    fn select_heap(&self, ctxs: &mut ContextTable, method_ctx: CtxId, obj: ObjId) -> CtxId;
}

/// Everything in the empty context; equivalent to the CI analysis.
pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    fn select_static(&self, ctxs: &mut ContextTable, _: CtxId, _: StmtIdx, _: MethodIdx) -> CtxId {
        ctxs.empty()
    }

    fn select_instance(
        &self,
        ctxs: &mut ContextTable,
        _: CtxId,
        _: StmtIdx,
        _: CtxId,
        _: ObjId,
        _: MethodIdx,
    ) -> CtxId {
        ctxs.empty()
    }

    fn select_heap(&self, ctxs: &mut ContextTable, _: CtxId, _: ObjId) -> CtxId {
        ctxs.empty()
    }
}

/// k-call-site sensitivity: callee contexts are the last k call sites on the
/// abstract call stack; heap contexts keep k−1.
pub struct KCallSite {
    pub k: usize,
}

impl ContextSelector for KCallSite {
    fn select_static(
        &self,
        ctxs: &mut ContextTable,
        caller_ctx: CtxId,
        site: StmtIdx,
        _: MethodIdx,
    ) -> CtxId {
        ctxs.append_k(caller_ctx, CtxElem::CallSite(site), self.k)
    }

    fn select_instance(
        &self,
        ctxs: &mut ContextTable,
        caller_ctx: CtxId,
        site: StmtIdx,
        _: CtxId,
        _: ObjId,
        _: MethodIdx,
    ) -> CtxId {
        ctxs.append_k(caller_ctx, CtxElem::CallSite(site), self.k)
    }

    fn select_heap(&self, ctxs: &mut ContextTable, method_ctx: CtxId, _: ObjId) -> CtxId {
        ctxs.truncate_k(method_ctx, self.k.saturating_sub(1))
    }
}

/// k-object sensitivity: instance callees are analyzed under the receiver's
/// allocation chain; static calls inherit the caller context unchanged.
pub struct KObject {
    pub k: usize,
}

impl ContextSelector for KObject {
    fn select_static(
        &self,
        _: &mut ContextTable,
        caller_ctx: CtxId,
        _: StmtIdx,
        _: MethodIdx,
    ) -> CtxId {
        caller_ctx
    }

    fn select_instance(
        &self,
        ctxs: &mut ContextTable,
        _: CtxId,
        _: StmtIdx,
        recv_ctx: CtxId,
        recv_obj: ObjId,
        _: MethodIdx,
    ) -> CtxId {
        ctxs.append_k(recv_ctx, CtxElem::Obj(recv_obj), self.k)
    }

    fn select_heap(&self, ctxs: &mut ContextTable, method_ctx: CtxId, _: ObjId) -> CtxId {
        ctxs.truncate_k(method_ctx, self.k.saturating_sub(1))
    }
}

/// Map a policy name (the `cs` / `pta` option values) to a selector.
pub fn selector_for(name: &str) -> Option<Box<dyn ContextSelector>> {
    match name {
        "ci" => Some(Box::new(ContextInsensitive)),
        "1-call" => Some(Box::new(KCallSite { k: 1 })),
        "2-call" => Some(Box::new(KCallSite { k: 2 })),
        "1-obj" => Some(Box::new(KObject { k: 1 })),
        "2-obj" => Some(Box::new(KObject { k: 2 })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_id_zero() {
        let ctxs = ContextTable::new();
        assert_eq!(ctxs.empty(), 0);
        assert!(ctxs.elems(0).is_empty());
    }

    #[test]
    fn append_k_keeps_the_last_k_elements() {
        let mut ctxs = ContextTable::new();
        let c1 = ctxs.append_k(ctxs.empty(), CtxElem::CallSite(10), 2);
        let c2 = ctxs.append_k(c1, CtxElem::CallSite(20), 2);
        let c3 = ctxs.append_k(c2, CtxElem::CallSite(30), 2);
        assert_eq!(
            ctxs.elems(c3),
            &[CtxElem::CallSite(20), CtxElem::CallSite(30)]
        );
    }

    #[test]
    fn interning_is_structural() {
        let mut ctxs = ContextTable::new();
        let a = ctxs.intern(vec![CtxElem::Obj(1), CtxElem::Obj(2)]);
        let b = ctxs.intern(vec![CtxElem::Obj(1), CtxElem::Obj(2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn one_call_heap_contexts_are_empty() {
        let mut ctxs = ContextTable::new();
        let selector = KCallSite { k: 1 };
        let empty_ctx = ctxs.empty();
        let callee_ctx = selector.select_static(&mut ctxs, empty_ctx, 5, 0);
        let empty_ctx = ctxs.empty();
        assert_eq!(selector.select_heap(&mut ctxs, callee_ctx, 0), empty_ctx);
    }
}
