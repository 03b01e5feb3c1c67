//! Unified error handling for the ferro compiler.
//!
//! Each pipeline stage returns a `Result` whose error belongs to one family:
//! source I/O, lexical, syntactic, semantic or code generation. The first
//! failure aborts the stage; nothing is recoverable within the pipeline.
//! [`CompileError`] unifies the families so the driver can report whichever
//! failure came first, and can render it against the original [`Source`].


use std::fmt;
use std::io;

use crate::source::{Position, Source};

/// Source-text acquisition failure.
#[derive(Debug)]
pub enum SourceError {
    Read { target: String, cause: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Read { target, cause } => {
                write!(f, "IO error while reading {}: {}", target, cause)
            }
        }
    }
}

/// Tokenization failure.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { ch: char, position: Position },
    UnterminatedString { position: Position },
    InvalidNumber { text: String, position: Position },
    IntegerOverflow { text: String, position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedCharacter { position, .. }
            | LexError::UnterminatedString { position }
            | LexError::InvalidNumber { position, .. }
            | LexError::IntegerOverflow { position, .. } => *position,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter { ch, .. } => {
                write!(f, "unrecognised character `{}`", ch)
            }
            LexError::UnterminatedString { .. } => {
                write!(f, "reached end of file while collecting a string literal")
            }
            LexError::InvalidNumber { text, .. } => {
                write!(f, "cannot convert `{}` to an int", text)
            }
            LexError::IntegerOverflow { text, .. } => {
                write!(f, "number `{}` is too big to fit in an int", text)
            }
        }
    }
}

/// Syntax error with the token position it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Rejection by the semantic analyser.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    ReservedWord {
        name: String,
        position: Position,
    },
    UndefinedVariable {
        name: String,
        position: Position,
    },
    UndefinedFunction {
        name: String,
        position: Position,
    },
    VariableRedeclaration {
        name: String,
        position: Position,
    },
    FunctionRedeclaration {
        name: String,
        position: Position,
    },
    ParameterRedeclaration {
        name: String,
        position: Position,
    },
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        position: Position,
    },
    TypeMismatch {
        expected: String,
        found: String,
        position: Position,
    },
    MissingReturn {
        function: String,
        position: Position,
    },
    MainTakesParameters {
        position: Position,
    },
    MainMustReturnInt {
        position: Position,
    },
}

impl SemanticError {
    pub fn position(&self) -> Position {
        match self {
            SemanticError::ReservedWord { position, .. }
            | SemanticError::UndefinedVariable { position, .. }
            | SemanticError::UndefinedFunction { position, .. }
            | SemanticError::VariableRedeclaration { position, .. }
            | SemanticError::FunctionRedeclaration { position, .. }
            | SemanticError::ParameterRedeclaration { position, .. }
            | SemanticError::ArgumentCountMismatch { position, .. }
            | SemanticError::TypeMismatch { position, .. }
            | SemanticError::MissingReturn { position, .. }
            | SemanticError::MainTakesParameters { position }
            | SemanticError::MainMustReturnInt { position } => *position,
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::ReservedWord { name, .. } => {
                write!(f, "`{}` is reserved and cannot be used as an identifier", name)
            }
            SemanticError::UndefinedVariable { name, .. } => {
                write!(f, "cannot find a variable named `{}` in scope", name)
            }
            SemanticError::UndefinedFunction { name, .. } => {
                write!(f, "call to undefined function `{}`", name)
            }
            SemanticError::VariableRedeclaration { name, .. } => {
                write!(f, "redeclaration of variable `{}`", name)
            }
            SemanticError::FunctionRedeclaration { name, .. } => {
                write!(f, "redeclaration of function `{}`", name)
            }
            SemanticError::ParameterRedeclaration { name, .. } => {
                write!(f, "redeclaration of parameter `{}`", name)
            }
            SemanticError::ArgumentCountMismatch {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "wrong number of arguments to `{}`: expected {}, got {}",
                name, expected, found
            ),
            SemanticError::TypeMismatch {
                expected, found, ..
            } => write!(f, "type mismatch: expected {}, found {}", expected, found),
            SemanticError::MissingReturn { function, .. } => write!(
                f,
                "not all paths through `{}` end with a return statement",
                function
            ),
            SemanticError::MainTakesParameters { .. } => {
                write!(f, "`main` must take no parameters")
            }
            SemanticError::MainMustReturnInt { .. } => write!(f, "`main` must return int"),
        }
    }
}

/// Code-generation failure.
#[derive(Debug)]
pub enum CodegenError {
    MissingMain,
    InvalidWriteTarget,
    Llvm(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::MissingMain => write!(f, "undefined reference to `main`"),
            CodegenError::InvalidWriteTarget => {
                write!(f, "expression does not denote a storage location")
            }
            CodegenError::Llvm(message) => write!(f, "{}", message),
        }
    }
}

/// Any failure from any stage of the pipeline.
#[derive(Debug)]
pub enum CompileError {
    Source(SourceError),
    Lex(LexError),
    Parse(ParseError),
    Semantic(SemanticError),
    Codegen(CodegenError),
}

impl CompileError {
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Source(_) => "source error",
            CompileError::Lex(_) => "lexical error",
            CompileError::Parse(_) => "syntax error",
            CompileError::Semantic(_) => "semantic error",
            CompileError::Codegen(_) => "code generation error",
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Source(_) | CompileError::Codegen(_) => None,
            CompileError::Lex(error) => Some(error.position()),
            CompileError::Parse(error) => Some(error.position),
            CompileError::Semantic(error) => Some(error.position()),
        }
    }

    /// Frame the error against the source text:
    ///
    /// ```text
    /// Line N column M:
    /// <offending source line>
    ///       ^
    /// <description>
    /// ```
    ///
    /// Errors without a position render as their message alone.
    pub fn render(&self, source: &Source) -> String {
        match self.position() {
            Some(position) => {
                let line = source.get_lines(position.line, position.line + 1);
                let line = line.trim_end_matches('\n');
                let caret_pad = " ".repeat((position.column as usize).saturating_sub(1));
                format!(
                    "Line {} column {}:\n{}\n{}^\n{}",
                    position.line, position.column, line, caret_pad, self
                )
            }
            None => self.to_string(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Source(error) => error.fmt(f),
            CompileError::Lex(error) => error.fmt(f),
            CompileError::Parse(error) => error.fmt(f),
            CompileError::Semantic(error) => error.fmt(f),
            CompileError::Codegen(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<SourceError> for CompileError {
    fn from(error: SourceError) -> Self {
        CompileError::Source(error)
    }
}

impl From<LexError> for CompileError {
    fn from(error: LexError) -> Self {
        CompileError::Lex(error)
    }
}

impl From<ParseError> for CompileError {
    fn from(error: ParseError) -> Self {
        CompileError::Parse(error)
    }
}

impl From<SemanticError> for CompileError {
    fn from(error: SemanticError) -> Self {
        CompileError::Semantic(error)
    }
}

impl From<CodegenError> for CompileError {
    fn from(error: CodegenError) -> Self {
        CompileError::Codegen(error)
    }
}
