pub mod compiler;
pub mod error;
pub mod parameters;

pub use compiler::{compiler_for, BicepCliCompiler, JsonTemplateLoader, TemplateCompiler};
pub use error::{CompileError, LoadError};
pub use parameters::{load_parameters, normalize_parameters};
