pub mod constprop;
pub mod deadcode;
pub mod fact;
pub mod inter;
pub mod livevars;
pub mod solver;
pub mod value;

pub use constprop::ConstantPropagation;
pub use deadcode::find_dead_code;
pub use fact::{CpFact, DataflowResult};
pub use inter::{solve_inter, InterResult};
pub use solver::{solve, DataflowAnalysis};
pub use value::Value;
