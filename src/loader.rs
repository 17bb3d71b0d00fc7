//! Sources for `load` and `require`.
//!
//! The evaluator never touches the filesystem itself: it asks the
//! [`SourceLoader`] held by its [`crate::evaluator::Context`] for the top-level
//! forms of a file. Every failure is reported as [`Error::LoadError`].

use std::collections::HashMap;
#[cfg(feature = "lexer")]
use std::path::PathBuf;

use log::debug;

use crate::Error;
use crate::ast::Expr;

/// Provides the parsed top-level forms of a named source file
pub trait SourceLoader {
    fn load(&self, filename: &str) -> Result<Vec<Expr>, Error>;
}

fn load_error(filename: &str, message: impl Into<String>) -> Error {
    Error::LoadError {
        filename: filename.to_owned(),
        message: message.into(),
    }
}

/// Tokenize and parse a whole source file
#[cfg(feature = "lexer")]
fn parse_source(filename: &str, source: &str) -> Result<Vec<Expr>, Error> {
    crate::lexer::tokenize(source)
        .and_then(|tokens| crate::parser::parse_program(&tokens))
        .map_err(|err| load_error(filename, err.to_string()))
}

/// Refuses every file; the default for contexts without a loader
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl SourceLoader for NoLoader {
    fn load(&self, filename: &str) -> Result<Vec<Expr>, Error> {
        Err(load_error(filename, "no source loader configured"))
    }
}

/// Reads files relative to a base directory
#[cfg(feature = "lexer")]
#[derive(Debug, Clone)]
pub struct FsLoader {
    base_dir: PathBuf,
}

#[cfg(feature = "lexer")]
impl FsLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FsLoader {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }
}

#[cfg(feature = "lexer")]
impl SourceLoader for FsLoader {
    fn load(&self, filename: &str) -> Result<Vec<Expr>, Error> {
        let path = self.base_dir.join(filename);
        debug!("reading {}", path.display());
        let source = std::fs::read_to_string(&path)
            .map_err(|err| load_error(filename, format!("{}: {err}", path.display())))?;
        parse_source(filename, &source)
    }
}

/// Sources registered in memory, keyed by filename
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<Expr>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    /// Register already parsed forms under `filename`
    #[must_use]
    pub fn with_forms(mut self, filename: impl Into<String>, forms: Vec<Expr>) -> Self {
        self.files.insert(filename.into(), forms);
        self
    }

    /// Register source text under `filename`; it is parsed right away
    #[cfg(feature = "lexer")]
    pub fn with_source(self, filename: impl Into<String>, source: &str) -> Result<Self, Error> {
        let filename = filename.into();
        let forms = parse_source(&filename, source)?;
        Ok(self.with_forms(filename, forms))
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, filename: &str) -> Result<Vec<Expr>, Error> {
        debug!("loading {filename} from memory");
        self.files
            .get(filename)
            .cloned()
            .ok_or_else(|| load_error(filename, "no such file"))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{num, sym};

    #[test]
    fn test_no_loader_refuses() {
        assert!(matches!(
            NoLoader.load("a.lisp"),
            Err(Error::LoadError { filename, .. }) if filename == "a.lisp"
        ));
    }

    #[test]
    fn test_memory_loader_forms() {
        let loader = MemoryLoader::new().with_forms("a.lisp", vec![sym("x"), num(1)]);
        assert_eq!(loader.load("a.lisp").unwrap(), vec![sym("x"), num(1)]);
        assert!(matches!(loader.load("b.lisp"), Err(Error::LoadError { .. })));
    }

    #[cfg(feature = "lexer")]
    #[test]
    fn test_memory_loader_source() {
        let loader = MemoryLoader::new()
            .with_source("a.lisp", "(define x 1) ; comment\nx")
            .unwrap();
        assert_eq!(loader.load("a.lisp").unwrap().len(), 2);

        let err = MemoryLoader::new().with_source("bad.lisp", "(define").unwrap_err();
        assert!(matches!(
            err,
            Error::LoadError { filename, message }
                if filename == "bad.lisp" && message.contains("unmatched opening parenthesis")
        ));
    }

    #[cfg(feature = "lexer")]
    #[test]
    fn test_fs_loader() {
        let dir = std::env::temp_dir().join(format!("modlisp-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lib.lisp"), "(module lib (export one) (define one 1))").unwrap();

        let loader = FsLoader::new(&dir);
        assert_eq!(loader.base_dir(), dir.as_path());
        let forms = loader.load("lib.lisp").unwrap();
        assert!(matches!(forms.as_slice(), [Expr::Module { name, .. }] if name == "lib"));

        assert!(matches!(
            loader.load("missing.lisp"),
            Err(Error::LoadError { filename, .. }) if filename == "missing.lisp"
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
