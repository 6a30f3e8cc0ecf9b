use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Template not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Compiler not found: {0}")]
    CompilerNotFound(String),

    #[error("Compilation failed: {0}")]
    Failed(String),

    #[error("Compiled template is not valid JSON: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Parameter file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid parameter file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid parameter file: {0}")]
    Shape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
