//! JSON frontend: deserialize the raw document with serde, then resolve
//! every name (classes, fields, methods, variables) into arena indices
//! through the `ProgramBuilder`. Dangling references fail fast — a program
//! that does not resolve is a precondition violation, not something the
//! analyses should paper over.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::AnalyzerError;
use crate::ir::builder::{BodyBuilder, ProgramBuilder};
use crate::ir::program::Program;
use crate::ir::stmt::{
    BinaryOp, CallKind, CondExp, Exp, Literal, MethodIdx, Stmt, SubSig, VarIdx,
};
use crate::ir::types::{ClassIdx, Ty};
use crate::loader::version::check_version;

// ── Raw document shapes ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawProgram {
    format_version: String,
    #[serde(default)]
    entry: Option<String>,
    classes: Vec<RawClass>,
}

#[derive(Debug, Deserialize)]
struct RawClass {
    name: String,
    #[serde(rename = "super", default)]
    superclass: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    interface: bool,
    #[serde(rename = "abstract", default)]
    is_abstract: bool,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    methods: Vec<RawMethod>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(rename = "static", default)]
    is_static: bool,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    name: String,
    #[serde(default)]
    params: Vec<RawVar>,
    #[serde(rename = "return", default)]
    ret: Option<String>,
    #[serde(rename = "static", default)]
    is_static: bool,
    #[serde(rename = "abstract", default)]
    is_abstract: bool,
    #[serde(default)]
    vars: Vec<RawVar>,
    #[serde(default)]
    body: Vec<RawStmt>,
}

#[derive(Debug, Deserialize)]
struct RawVar {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum RawStmt {
    Nop,
    Const {
        var: String,
        value: serde_json::Value,
    },
    Copy {
        to: String,
        from: String,
    },
    Binary {
        var: String,
        oper: String,
        lhs: String,
        rhs: String,
    },
    New {
        var: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Load {
        var: String,
        #[serde(default)]
        base: Option<String>,
        field: String,
    },
    Store {
        #[serde(default)]
        base: Option<String>,
        field: String,
        from: String,
    },
    Aload {
        var: String,
        base: String,
        index: String,
    },
    Astore {
        base: String,
        index: String,
        from: String,
    },
    Invoke {
        kind: String,
        #[serde(default)]
        var: Option<String>,
        #[serde(default)]
        base: Option<String>,
        class: String,
        method: String,
        #[serde(default)]
        sig: Vec<String>,
        #[serde(default)]
        ret: Option<String>,
        #[serde(default)]
        args: Vec<String>,
    },
    If {
        lhs: String,
        oper: String,
        rhs: String,
        target: usize,
    },
    Goto {
        target: usize,
    },
    Switch {
        var: String,
        cases: Vec<(i32, usize)>,
        default: usize,
    },
    Return {
        #[serde(default)]
        var: Option<String>,
    },
}

// ── Public API ──────────────────────────────────────────────────────────────

pub fn load_program(path: &Path) -> Result<Program, AnalyzerError> {
    let content = std::fs::read_to_string(path).map_err(|e| AnalyzerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw: RawProgram = serde_json::from_str(&content).map_err(|e| AnalyzerError::JsonParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    resolve(raw)
}

pub fn parse_program(content: &str) -> Result<Program, AnalyzerError> {
    let raw: RawProgram = serde_json::from_str(content).map_err(|e| AnalyzerError::JsonParse {
        path: "<inline>".into(),
        source: e,
    })?;
    resolve(raw)
}

// ── Resolution ──────────────────────────────────────────────────────────────

fn resolve(raw: RawProgram) -> Result<Program, AnalyzerError> {
    check_version(&raw.format_version)?;

    let mut builder = ProgramBuilder::new();

    // pass 1: classes, so forward type references resolve
    let mut class_ids: HashMap<String, ClassIdx> = HashMap::new();
    for class in &raw.classes {
        let id = if class.interface {
            builder.add_interface(&class.name)
        } else {
            builder.add_class(&class.name, None)
        };
        if class.is_abstract {
            builder.set_abstract(id);
        }
        if class_ids.insert(class.name.clone(), id).is_some() {
            return Err(AnalyzerError::Resolve {
                what: format!("duplicate class '{}'", class.name),
            });
        }
    }

    let lookup_class = |name: &str, class_ids: &HashMap<String, ClassIdx>| {
        class_ids
            .get(name)
            .copied()
            .ok_or_else(|| AnalyzerError::Resolve {
                what: format!("unknown class '{name}'"),
            })
    };

    // pass 2: supertypes and fields
    let mut field_ids: HashMap<(ClassIdx, String), usize> = HashMap::new();
    for class in &raw.classes {
        let id = class_ids[&class.name];
        if let Some(sup) = &class.superclass {
            let sup = lookup_class(sup, &class_ids)?;
            builder.set_superclass(id, sup);
        }
        for iface in &class.interfaces {
            let iface = lookup_class(iface, &class_ids)?;
            builder.implement(id, iface);
        }
        for field in &class.fields {
            let ty = parse_ty(&field.ty, &class_ids)?;
            let f = builder.add_field(id, &field.name, ty, field.is_static);
            field_ids.insert((id, field.name.clone()), f);
        }
    }

    // pass 3: method declarations
    let mut method_decls: Vec<(ClassIdx, MethodIdx, &RawMethod)> = Vec::new();
    for class in &raw.classes {
        let class_id = class_ids[&class.name];
        for method in &class.methods {
            let subsig = SubSig {
                name: method.name.clone(),
                params: method
                    .params
                    .iter()
                    .map(|p| parse_ty(&p.ty, &class_ids))
                    .collect::<Result<_, _>>()?,
                ret: parse_ty(method.ret.as_deref().unwrap_or("void"), &class_ids)?,
            };
            let m = if method.is_abstract {
                builder.declare_abstract_method(class_id, subsig)
            } else {
                builder.declare_method(class_id, subsig, method.is_static)
            };
            method_decls.push((class_id, m, method));
        }
    }

    // pass 4: bodies
    for (class_id, m, method) in method_decls {
        if method.is_abstract {
            continue;
        }
        let mut env: HashMap<String, VarIdx> = HashMap::new();
        for (i, param) in method.params.iter().enumerate() {
            env.insert(param.name.clone(), builder.param(m, i));
        }
        if !method.is_static {
            env.insert("this".to_string(), builder.this_var(m));
        }
        let mut result: Result<(), AnalyzerError> = Ok(());
        builder.method_body(m, |body| {
            result = lower_body(body, method, &mut env, &class_ids, &field_ids, class_id);
        });
        result?;
    }

    let mut program = builder.finish();
    if let Some(entry) = &raw.entry {
        let m = program
            .lookup_method(entry)
            .ok_or_else(|| AnalyzerError::Resolve {
                what: format!("entry method '{entry}' not found"),
            })?;
        program.entry = Some(m);
    }
    Ok(program)
}

fn lower_body(
    body: &mut BodyBuilder,
    method: &RawMethod,
    env: &mut HashMap<String, VarIdx>,
    class_ids: &HashMap<String, ClassIdx>,
    field_ids: &HashMap<(ClassIdx, String), usize>,
    _class_id: ClassIdx,
) -> Result<(), AnalyzerError> {
    for var in &method.vars {
        let ty = parse_ty(&var.ty, class_ids)?;
        env.insert(var.name.clone(), body.var(&var.name, ty));
    }
    let lookup_var = |name: &str| {
        env.get(name).copied().ok_or_else(|| AnalyzerError::Resolve {
            what: format!("unknown variable '{name}' in method '{}'", method.name),
        })
    };
    let lookup_field = |reference: &str| {
        let (class_name, field_name) = reference.rsplit_once('.').ok_or_else(|| {
            AnalyzerError::Resolve {
                what: format!("field reference '{reference}' is not 'Class.field'"),
            }
        })?;
        let class = class_ids
            .get(class_name)
            .copied()
            .ok_or_else(|| AnalyzerError::Resolve {
                what: format!("unknown class '{class_name}' in field reference"),
            })?;
        field_ids
            .get(&(class, field_name.to_string()))
            .copied()
            .ok_or_else(|| AnalyzerError::Resolve {
                what: format!("unknown field '{reference}'"),
            })
    };

    for stmt in &method.body {
        let lowered = match stmt {
            RawStmt::Nop => Stmt::Nop,
            RawStmt::Const { var, value } => {
                let literal = parse_literal(value)?;
                Stmt::Assign {
                    lhs: lookup_var(var)?,
                    rhs: Exp::Literal(literal),
                }
            }
            RawStmt::Copy { to, from } => Stmt::Assign {
                lhs: lookup_var(to)?,
                rhs: Exp::Var(lookup_var(from)?),
            },
            RawStmt::Binary {
                var,
                oper,
                lhs,
                rhs,
            } => Stmt::Assign {
                lhs: lookup_var(var)?,
                rhs: Exp::Binary {
                    op: parse_binary_op(oper)?,
                    lhs: lookup_var(lhs)?,
                    rhs: lookup_var(rhs)?,
                },
            },
            RawStmt::New { var, ty } => Stmt::New {
                lhs: lookup_var(var)?,
                ty: parse_ty(ty, class_ids)?,
            },
            RawStmt::Load { var, base, field } => Stmt::LoadField {
                lhs: lookup_var(var)?,
                base: base.as_deref().map(lookup_var).transpose()?,
                field: lookup_field(field)?,
            },
            RawStmt::Store { base, field, from } => Stmt::StoreField {
                base: base.as_deref().map(lookup_var).transpose()?,
                field: lookup_field(field)?,
                rhs: lookup_var(from)?,
            },
            RawStmt::Aload { var, base, index } => Stmt::LoadArray {
                lhs: lookup_var(var)?,
                base: lookup_var(base)?,
                index: lookup_var(index)?,
            },
            RawStmt::Astore { base, index, from } => Stmt::StoreArray {
                base: lookup_var(base)?,
                index: lookup_var(index)?,
                rhs: lookup_var(from)?,
            },
            RawStmt::Invoke {
                kind,
                var,
                base,
                class,
                method: name,
                sig,
                ret,
                args,
            } => {
                let kind = parse_call_kind(kind)?;
                let declared = class_ids
                    .get(class)
                    .copied()
                    .ok_or_else(|| AnalyzerError::Resolve {
                        what: format!("unknown class '{class}' at call site"),
                    })?;
                let subsig = SubSig {
                    name: name.clone(),
                    params: sig
                        .iter()
                        .map(|t| parse_ty(t, class_ids))
                        .collect::<Result<_, _>>()?,
                    ret: parse_ty(ret.as_deref().unwrap_or("void"), class_ids)?,
                };
                Stmt::Invoke {
                    result: var.as_deref().map(lookup_var).transpose()?,
                    call: crate::ir::stmt::InvokeExp {
                        kind,
                        base: base.as_deref().map(lookup_var).transpose()?,
                        method_ref: crate::ir::stmt::MethodRef {
                            class: declared,
                            subsig,
                        },
                        args: args
                            .iter()
                            .map(|a| lookup_var(a))
                            .collect::<Result<_, _>>()?,
                    },
                }
            }
            RawStmt::If {
                lhs,
                oper,
                rhs,
                target,
            } => Stmt::If {
                cond: CondExp {
                    op: parse_binary_op(oper)?,
                    lhs: lookup_var(lhs)?,
                    rhs: lookup_var(rhs)?,
                },
                target: *target,
            },
            RawStmt::Goto { target } => Stmt::Goto { target: *target },
            RawStmt::Switch {
                var,
                cases,
                default,
            } => Stmt::Switch {
                var: lookup_var(var)?,
                cases: cases.clone(),
                default: *default,
            },
            RawStmt::Return { var } => Stmt::Return {
                value: var.as_deref().map(lookup_var).transpose()?,
            },
        };
        body.emit_raw(lowered);
    }
    Ok(())
}

fn parse_literal(value: &serde_json::Value) -> Result<Literal, AnalyzerError> {
    if let Some(b) = value.as_bool() {
        return Ok(Literal::Bool(b));
    }
    if let Some(i) = value.as_i64() {
        return i32::try_from(i).map(Literal::Int).map_err(|_| {
            AnalyzerError::Resolve {
                what: format!("integer literal {i} out of 32-bit range"),
            }
        });
    }
    Err(AnalyzerError::Resolve {
        what: format!("unsupported literal {value}"),
    })
}

fn parse_ty(s: &str, class_ids: &HashMap<String, ClassIdx>) -> Result<Ty, AnalyzerError> {
    if let Some(elem) = s.strip_suffix("[]") {
        return Ok(Ty::Array(Box::new(parse_ty(elem, class_ids)?)));
    }
    Ok(match s {
        "byte" => Ty::Byte,
        "short" => Ty::Short,
        "int" => Ty::Int,
        "char" => Ty::Char,
        "boolean" => Ty::Boolean,
        "long" => Ty::Long,
        "float" => Ty::Float,
        "double" => Ty::Double,
        "void" => Ty::Void,
        "null" => Ty::Null,
        name => Ty::Class(class_ids.get(name).copied().ok_or_else(|| {
            AnalyzerError::Resolve {
                what: format!("unknown type '{name}'"),
            }
        })?),
    })
}

fn parse_binary_op(s: &str) -> Result<BinaryOp, AnalyzerError> {
    Ok(match s {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        ">>>" => BinaryOp::Ushr,
        "&" => BinaryOp::And,
        "|" => BinaryOp::Or,
        "^" => BinaryOp::Xor,
        other => {
            return Err(AnalyzerError::Resolve {
                what: format!("unknown operator '{other}'"),
            })
        }
    })
}

fn parse_call_kind(s: &str) -> Result<CallKind, AnalyzerError> {
    Ok(match s {
        "static" => CallKind::Static,
        "special" => CallKind::Special,
        "virtual" => CallKind::Virtual,
        "interface" => CallKind::Interface,
        "dynamic" => CallKind::Dynamic,
        "other" => CallKind::Other,
        other => {
            return Err(AnalyzerError::Resolve {
                what: format!("unknown call kind '{other}'"),
            })
        }
    })
}
