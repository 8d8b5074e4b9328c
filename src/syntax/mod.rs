/// Rego syntax: the module tree, its parser, the project compiler and the
/// built-in function catalog.
///
/// - [`ast`]: the owned syntax tree every resolver walks.
/// - [`parse_module`]: text to [`Module`], stopping at the first syntax
///   error.
/// - [`compile`]: whole-project checks that need every module in view.
/// - [`builtins`]: the static catalog of built-in functions.
pub mod ast;
pub mod builtins;
mod compile;
mod parser;

pub use ast::*;
pub use compile::compile;
pub use parser::parse_module;

use thiserror::Error;

use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The text holds no statements at all.
    EmptyModule,
    /// The first statement is not a `package` clause.
    PackageExpected,
    Syntax,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: rego_parse_error: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: rego_compile_error: {message}")]
pub struct CompileError {
    pub message: String,
    pub location: SourceLocation,
}

/// Any problem reported for a file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegoError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl RegoError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            RegoError::Parse(err) => &err.location,
            RegoError::Compile(err) => &err.location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RegoError::Parse(err) => &err.message,
            RegoError::Compile(err) => &err.message,
        }
    }
}
