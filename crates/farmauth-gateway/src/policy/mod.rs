//! Policy layer (rule matrix, role presets, text compilation).
//!
//! The matrix is the only evaluation path; presets and compiled config
//! entries are just ordered rule appends.

pub mod compile;
pub mod matrix;
pub mod presets;

pub use compile::{compile_field, compile_grants, Grant};
pub use matrix::PolicyMatrix;
pub use presets::{PresetFactory, RoleTemplate};
