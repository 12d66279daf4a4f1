//! Source locations and the interned file table

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Interned handle to a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// A span in a source file. Every field other than the file is optional:
/// synthesized nodes may carry only a file, or nothing at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SourceLocation {
    pub file: Option<FileId>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: FileId, line: u32, column: u32) -> Self {
        Self {
            file: Some(file),
            line: Some(line),
            column: Some(column),
            end_line: None,
            end_column: None,
        }
    }

    pub fn with_end(mut self, end_line: u32, end_column: u32) -> Self {
        self.end_line = Some(end_line);
        self.end_column = Some(end_column);
        self
    }

    /// A location pointing at the start of the given file, used when a
    /// diagnostic has nothing more precise to anchor to.
    pub fn file_start(file: FileId) -> Self {
        Self::new(file, 1, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{line}:{column}"),
            (Some(line), None) => write!(f, "{line}"),
            _ => write!(f, "?"),
        }
    }
}

/// Interned table of source files, shared by reference across a compilation
#[derive(Debug, Default)]
pub struct FileTable {
    paths: Vec<PathBuf>,
    sources: Vec<Rc<str>>,
    by_path: BTreeMap<PathBuf, FileId>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a file, returning its existing id if already present
    pub fn intern(&mut self, path: impl Into<PathBuf>, source: impl Into<Rc<str>>) -> FileId {
        let path = path.into();
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let id = FileId(self.paths.len() as u32);
        self.by_path.insert(path.clone(), id);
        self.paths.push(path);
        self.sources.push(source.into());
        id
    }

    pub fn path(&self, id: FileId) -> Option<&Path> {
        self.paths.get(id.0 as usize).map(PathBuf::as_path)
    }

    pub fn source(&self, id: FileId) -> Option<&str> {
        self.sources.get(id.0 as usize).map(|s| &**s)
    }

    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
