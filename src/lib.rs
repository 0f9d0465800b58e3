pub mod bound;
pub mod codegen;
pub mod config;
pub mod error;
pub mod index;
pub mod intern;
pub mod ir;
pub mod primitive;

pub use codegen::{lower_compilation_unit, lower_function};
pub use error::LoweringError;
