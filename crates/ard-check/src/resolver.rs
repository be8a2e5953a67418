//! Loading of non-std modules imported with `use project/path`.

use ard_ast::{Program, SourceMap};
use ard_parser::ParseError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("module `{path}` not found at {}", file.display())]
    NotFound { path: String, file: PathBuf },
    #[error("failed to read module `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("module `{path}` has {} syntax error(s)", errors.len())]
    Parse {
        path: String,
        errors: Vec<ParseError>,
    },
}

/// Turns an import path into a parsed program.
pub trait ModuleResolver {
    fn resolve(&mut self, path: &str) -> Result<Program, ResolveError>;
}

/// Resolves `project/a/b` to `<root>/a/b.ard`.
///
/// Loaded sources are registered in the shared [`SourceMap`] so diagnostics
/// inside modules render with their own file name.
pub struct FsModuleResolver<'a> {
    root: PathBuf,
    sources: &'a mut SourceMap,
}

impl<'a> FsModuleResolver<'a> {
    pub fn new(root: impl Into<PathBuf>, sources: &'a mut SourceMap) -> Self {
        Self {
            root: root.into(),
            sources,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, path: &str) -> PathBuf {
        let mut file = self.root.clone();
        for segment in path.split('/').skip(1) {
            file.push(segment);
        }
        file.set_extension("ard");
        file
    }
}

impl ModuleResolver for FsModuleResolver<'_> {
    fn resolve(&mut self, path: &str) -> Result<Program, ResolveError> {
        let file = self.file_for(path);
        if !file.is_file() {
            return Err(ResolveError::NotFound {
                path: path.to_string(),
                file,
            });
        }
        let source = std::fs::read_to_string(&file).map_err(|source| ResolveError::Io {
            path: path.to_string(),
            source,
        })?;
        debug!(module = path, file = %file.display(), "loading module");
        let file_id = self.sources.add_file(file, source.clone());
        ard_parser::parse_program(&source, file_id).map_err(|errors| ResolveError::Parse {
            path: path.to_string(),
            errors,
        })
    }
}

/// Resolver for programs that may not import external modules.
#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleResolver for NoModules {
    fn resolve(&mut self, path: &str) -> Result<Program, ResolveError> {
        Err(ResolveError::NotFound {
            path: path.to_string(),
            file: PathBuf::from(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_resolver_maps_path_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/math.ard"), "fn two() Int { 2 }").unwrap();

        let mut sources = SourceMap::new();
        let mut resolver = FsModuleResolver::new(dir.path(), &mut sources);
        let program = resolver.resolve("app/lib/math").unwrap();
        assert_eq!(program.statements.len(), 1);
        assert_eq!(sources.file_count(), 1);
    }

    #[test]
    fn test_missing_module_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut sources = SourceMap::new();
        let mut resolver = FsModuleResolver::new(dir.path(), &mut sources);
        assert!(matches!(
            resolver.resolve("app/missing"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_module_syntax_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.ard"), "fn (").unwrap();
        let mut sources = SourceMap::new();
        let mut resolver = FsModuleResolver::new(dir.path(), &mut sources);
        match resolver.resolve("app/bad") {
            Err(ResolveError::Parse { errors, .. }) => assert!(!errors.is_empty()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
