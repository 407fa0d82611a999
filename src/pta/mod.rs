pub mod ci;
pub mod context;
pub mod cs;
pub mod heap;
pub mod pfg;
pub mod pts;
pub mod result;

pub use ci::{solve_ci, CiSolution};
pub use context::{selector_for, ContextSelector};
pub use cs::{solve_cs, CsSolution};
pub use heap::{HeapModel, Obj, ObjId, ObjKind};
pub use pts::PointsToSet;
pub use result::PointerAnalysisResult;
