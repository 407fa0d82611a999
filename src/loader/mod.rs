pub mod json_loader;
pub mod version;

pub use json_loader::{load_program, parse_program};
pub use version::{check_version, FORMAT_VERSION};
