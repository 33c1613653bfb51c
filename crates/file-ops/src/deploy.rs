//! Compile-and-download of EV3 Basic and assembler sources.

use std::fmt;

use crate::ExplorerError;

/// Extension of a loadable program image.
pub const IMAGE_EXTENSION: &str = ".rbf";

/// Language of a compileable source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// EV3 Basic (`.sb`): compiled to assembler, then assembled.
    Basic,
    /// LMS assembler (`.lms`): assembled directly.
    Assembly,
}

impl SourceKind {
    /// Detects the language from a file name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".sb") {
            Some(Self::Basic)
        } else if lower.ends_with(".lms") {
            Some(Self::Assembly)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Basic => ".sb",
            Self::Assembly => ".lms",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Assembly => f.write_str("assembly"),
        }
    }
}

/// Name of the image built from `source_name`: the stem plus `.rbf`.
///
/// Any directory part of `source_name` is dropped.
pub fn target_name(source_name: &str) -> Result<(SourceKind, String), ExplorerError> {
    let file_name = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);
    let kind = SourceKind::from_name(file_name)
        .ok_or_else(|| ExplorerError::NotCompileable(source_name.to_string()))?;
    let stem = &file_name[..file_name.len() - kind.extension().len()];
    if stem.is_empty() {
        return Err(ExplorerError::InvalidName(file_name.to_string()));
    }
    Ok((kind, format!("{stem}{IMAGE_EXTENSION}")))
}

/// Turns source text into a loadable program image.
pub trait Compiler {
    /// Compiles `source`. On failure returns the compiler's error messages,
    /// one per line.
    fn compile(&mut self, kind: SourceKind, source: &[u8]) -> Result<Vec<u8>, Vec<String>>;
}

impl<T: Compiler + ?Sized> Compiler for &mut T {
    fn compile(&mut self, kind: SourceKind, source: &[u8]) -> Result<Vec<u8>, Vec<String>> {
        (**self).compile(kind, source)
    }
}
