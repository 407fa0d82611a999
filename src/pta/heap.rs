use std::collections::HashMap;

use crate::ir::stmt::StmtIdx;
use crate::ir::types::Ty;

/// Index into `HeapModel::objs` — the global object numbering shared by all
/// points-to sets of one analysis run.
pub type ObjId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjKind {
    /// Ordinary abstract object, identified by its allocation site.
    Alloc { site: StmtIdx },
    /// Pseudo-object synthesized by the taint analysis, identified by the
    /// call site of the source that produced it.
    Taint { source_call: StmtIdx },
}

#[derive(Debug, Clone)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: Ty,
}

/// Allocation-site heap abstraction: at most one abstract object per `new`
/// statement, at most one taint object per (source call, type) pair.
#[derive(Debug, Clone, Default)]
pub struct HeapModel {
    objs: Vec<Obj>,
    by_site: HashMap<StmtIdx, ObjId>,
    taints: HashMap<(StmtIdx, Ty), ObjId>,
}

impl HeapModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The abstract object for an allocation site.
    pub fn obj_at(&mut self, site: StmtIdx, ty: Ty) -> ObjId {
        if let Some(&id) = self.by_site.get(&site) {
            return id;
        }
        let id = self.objs.len();
        self.objs.push(Obj {
            kind: ObjKind::Alloc { site },
            ty,
        });
        self.by_site.insert(site, id);
        id
    }

    /// The taint pseudo-object for a source call site and result type.
    pub fn taint_obj(&mut self, source_call: StmtIdx, ty: Ty) -> ObjId {
        if let Some(&id) = self.taints.get(&(source_call, ty.clone())) {
            return id;
        }
        let id = self.objs.len();
        self.objs.push(Obj {
            kind: ObjKind::Taint { source_call },
            ty: ty.clone(),
        });
        self.taints.insert((source_call, ty), id);
        id
    }

    pub fn obj(&self, id: ObjId) -> &Obj {
        &self.objs[id]
    }

    pub fn is_taint(&self, id: ObjId) -> bool {
        matches!(self.objs[id].kind, ObjKind::Taint { .. })
    }

    /// The source call that produced a taint object.
    pub fn source_call_of(&self, id: ObjId) -> Option<StmtIdx> {
        match self.objs[id].kind {
            ObjKind::Taint { source_call } => Some(source_call),
            _ => None,
        }
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }
}
