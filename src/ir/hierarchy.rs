use std::collections::HashMap;

use crate::ir::program::Program;
use crate::ir::stmt::{MethodIdx, SubSig};
use crate::ir::types::ClassIdx;

/// Subtype queries and virtual dispatch over the class table.
///
/// Built once from a finished `Program`; owns copies of the structural data
/// it needs so analyses can hold it next to a `&Program` without aliasing.
#[derive(Debug)]
pub struct ClassHierarchy {
    superclass: Vec<Option<ClassIdx>>,
    is_interface: Vec<bool>,
    direct_subclasses: Vec<Vec<ClassIdx>>,
    direct_subinterfaces: Vec<Vec<ClassIdx>>,
    direct_implementors: Vec<Vec<ClassIdx>>,
    /// (class, subsignature) → declared method.
    declared: HashMap<(ClassIdx, SubSig), MethodIdx>,
    method_abstract: Vec<bool>,
}

impl ClassHierarchy {
    pub fn build(program: &Program) -> Self {
        let n = program.classes.len();
        let mut direct_subclasses = vec![Vec::new(); n];
        let mut direct_subinterfaces = vec![Vec::new(); n];
        let mut direct_implementors = vec![Vec::new(); n];
        let mut declared = HashMap::new();

        for (idx, class) in program.classes.iter().enumerate() {
            if let Some(sup) = class.superclass {
                direct_subclasses[sup].push(idx);
            }
            for &iface in &class.interfaces {
                if class.is_interface {
                    direct_subinterfaces[iface].push(idx);
                } else {
                    direct_implementors[iface].push(idx);
                }
            }
            for &m in &class.methods {
                declared.insert((idx, program.methods[m].subsig.clone()), m);
            }
        }

        Self {
            superclass: program.classes.iter().map(|c| c.superclass).collect(),
            is_interface: program.classes.iter().map(|c| c.is_interface).collect(),
            direct_subclasses,
            direct_subinterfaces,
            direct_implementors,
            declared,
            method_abstract: program.methods.iter().map(|m| m.is_abstract).collect(),
        }
    }

    pub fn superclass_of(&self, c: ClassIdx) -> Option<ClassIdx> {
        self.superclass[c]
    }

    pub fn is_interface(&self, c: ClassIdx) -> bool {
        self.is_interface[c]
    }

    pub fn direct_subclasses_of(&self, c: ClassIdx) -> &[ClassIdx] {
        &self.direct_subclasses[c]
    }

    pub fn direct_subinterfaces_of(&self, c: ClassIdx) -> &[ClassIdx] {
        &self.direct_subinterfaces[c]
    }

    pub fn direct_implementors_of(&self, c: ClassIdx) -> &[ClassIdx] {
        &self.direct_implementors[c]
    }

    /// The method `class` itself declares for `subsig`, ignoring inheritance.
    pub fn declared_method(&self, class: ClassIdx, subsig: &SubSig) -> Option<MethodIdx> {
        self.declared.get(&(class, subsig.clone())).copied()
    }

    /// Virtual dispatch: walk up the superclass chain from `class` and return
    /// the first concrete declaration of `subsig`. A hit on an abstract
    /// method, or no hit at all, resolves to `None`.
    pub fn dispatch(&self, class: ClassIdx, subsig: &SubSig) -> Option<MethodIdx> {
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(m) = self.declared_method(c, subsig) {
                return if self.method_abstract[m] { None } else { Some(m) };
            }
            current = self.superclass[c];
        }
        None
    }

    pub fn is_abstract_method(&self, m: MethodIdx) -> bool {
        self.method_abstract[m]
    }
}
