pub mod callgraph;
pub mod cfg;
pub mod icfg;

pub use callgraph::{build_cha, CallGraph, Edge};
pub use cfg::{Cfg, CfgNode, EdgeKind};
pub use icfg::{build_icfg, Icfg};
