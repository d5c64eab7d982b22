use crate::error::RunError;
use clap::ValueEnum;
use scl::Context;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How program text reaches the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LoaderKind {
    /// Hand the text to the engine directly
    #[default]
    Inline,
    /// Write the text to a fresh temporary file and import it
    Tempfile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgramLoader {
    Inline,
    /// Temporary files are created inside `dir`, one per request
    TempFile { dir: PathBuf },
}

impl ProgramLoader {
    pub fn new(kind: LoaderKind, tmp_dir: &Path) -> Self {
        match kind {
            LoaderKind::Inline => ProgramLoader::Inline,
            LoaderKind::Tempfile => ProgramLoader::TempFile {
                dir: tmp_dir.to_path_buf(),
            },
        }
    }

    pub fn load(&self, ctx: &mut Context, program: &str) -> Result<(), RunError> {
        let timeout_ms = ctx.limits().max_evaluation_time_ms;
        match self {
            ProgramLoader::Inline => ctx
                .add_program(program)
                .map_err(|e| RunError::from_engine(e, timeout_ms)),
            ProgramLoader::TempFile { dir } => {
                // Removed from disk when `file` drops, on every return path
                let mut file = tempfile::Builder::new()
                    .prefix("scl-program-")
                    .suffix(".scl")
                    .tempfile_in(dir)
                    .map_err(|e| {
                        RunError::Internal(format!(
                            "cannot create program file in {}: {}",
                            dir.display(),
                            e
                        ))
                    })?;
                file.write_all(program.as_bytes())
                    .and_then(|_| file.flush())
                    .map_err(|e| RunError::Internal(format!("cannot write program file: {}", e)))?;
                tracing::debug!(path = %file.path().display(), "importing program file");
                ctx.import_file(file.path())
                    .map_err(|e| RunError::from_engine(e, timeout_ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl::ProvenanceMode;

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_inline_loader() {
        let mut ctx = Context::new(ProvenanceMode::Unit);
        ProgramLoader::Inline
            .load(&mut ctx, "rel n = {(1)}")
            .unwrap();
        ctx.run().unwrap();
        assert_eq!(ctx.relation("n").unwrap().len(), 1);
    }

    #[test]
    fn test_tempfile_loader_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = ProgramLoader::new(LoaderKind::Tempfile, dir.path());
        let mut ctx = Context::new(ProvenanceMode::Unit);
        loader.load(&mut ctx, "rel n = {(1)}").unwrap();
        assert_eq!(files_in(dir.path()), 0);
        ctx.run().unwrap();
        assert_eq!(ctx.relation("n").unwrap().len(), 1);
    }

    #[test]
    fn test_tempfile_loader_cleans_up_after_syntax_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = ProgramLoader::new(LoaderKind::Tempfile, dir.path());
        let mut ctx = Context::new(ProvenanceMode::Unit);
        let err = loader.load(&mut ctx, "rel n = {(1)").unwrap_err();
        assert_eq!(err.kind(), "ProgramSyntaxError");
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn test_missing_tmp_dir_is_internal() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = ProgramLoader::new(LoaderKind::Tempfile, &dir.path().join("missing"));
        let mut ctx = Context::new(ProvenanceMode::Unit);
        let err = loader.load(&mut ctx, "rel n = {(1)}").unwrap_err();
        assert_eq!(err.kind(), "Internal");
    }
}
