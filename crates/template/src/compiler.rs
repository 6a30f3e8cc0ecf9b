use armdeploy_core::Template;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CompileError;

/// Turns a template source file into the deployable JSON template.
#[async_trait]
pub trait TemplateCompiler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn compile(&self, source: &Path) -> Result<Template, CompileError>;
}

/// Compiles Bicep through `az bicep build --stdout`.
pub struct BicepCliCompiler {
    program: PathBuf,
}

impl BicepCliCompiler {
    pub fn new() -> Self {
        Self::with_program("az")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for BicepCliCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateCompiler for BicepCliCompiler {
    fn name(&self) -> &'static str {
        "bicep"
    }

    async fn compile(&self, source: &Path) -> Result<Template, CompileError> {
        ensure_exists(source).await?;
        info!(source = %source.display(), "Building Bicep template");

        let output = Command::new(&self.program)
            .arg("bicep")
            .arg("build")
            .arg("--file")
            .arg(source)
            .arg("--stdout")
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    CompileError::CompilerNotFound(self.program.display().to_string())
                }
                _ => CompileError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::Failed(stderr.trim().to_string()));
        }

        let template = serde_json::from_slice(&output.stdout)?;
        debug!(bytes = output.stdout.len(), "Bicep template built");
        Ok(Template::new(template))
    }
}

/// Reads an already-compiled ARM JSON template.
#[derive(Default)]
pub struct JsonTemplateLoader;

#[async_trait]
impl TemplateCompiler for JsonTemplateLoader {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn compile(&self, source: &Path) -> Result<Template, CompileError> {
        ensure_exists(source).await?;

        let content = tokio::fs::read_to_string(source).await?;
        let template = serde_json::from_str(&content)?;
        debug!(source = %source.display(), "Loaded JSON template");
        Ok(Template::new(template))
    }
}

/// `.bicep` sources go through the Bicep compiler; anything else is read as
/// a JSON template.
pub fn compiler_for(source: &Path) -> Box<dyn TemplateCompiler> {
    let is_bicep = source
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bicep"));

    if is_bicep {
        Box::new(BicepCliCompiler::new())
    } else {
        Box::new(JsonTemplateLoader)
    }
}

async fn ensure_exists(source: &Path) -> Result<(), CompileError> {
    if tokio::fs::try_exists(source).await? {
        Ok(())
    } else {
        Err(CompileError::NotFound(source.to_path_buf()))
    }
}
