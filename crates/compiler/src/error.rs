//! Compile-time diagnostics.
//!
//! Diagnostics are collected during the single compilation pass and
//! rendered in the fixed `[line N] Error ...` form. A panic-mode latch in
//! the compiler suppresses cascading diagnostics until it resynchronizes at
//! a statement boundary, so the list holds only the first error of each
//! cascade.

use std::fmt;

/// Where in the source an error points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At a concrete token, quoted in the rendering.
    Token(String),
    /// At end of input.
    End,
    /// No location detail; used for scanner error tokens, whose message
    /// already describes the offending text.
    Unlocated,
}

/// One compile diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub line: u32,
    pub location: ErrorLocation,
    pub message: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            ErrorLocation::Token(text) => {
                write!(f, "[line {}] Error at '{}': {}", self.line, text, self.message)
            }
            ErrorLocation::End => {
                write!(f, "[line {}] Error at end: {}", self.line, self.message)
            }
            ErrorLocation::Unlocated => {
                write!(f, "[line {}] Error: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Every diagnostic from one compilation, in source order. Never empty when
/// returned as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
