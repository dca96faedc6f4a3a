use std::fmt;

/// Instruction family selected by the leading tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Stack,
    Arithmetic,
    Heap,
    FlowControl,
    Io,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Stack => "stack",
            Family::Arithmetic => "arithmetic",
            Family::Heap => "heap",
            Family::FlowControl => "flow control",
            Family::Io => "I/O",
        })
    }
}

/// A parsing error. `line` is the 1-based tokenizer line when the error was
/// detected; it is formatted first for CLI-friendly diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{line}: syntax error: unknown {family} operation")]
    Syntax { line: usize, family: Family },

    #[error("{line}: unexpected end of input")]
    UnexpectedEof { line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::UnexpectedEof { line } => *line,
        }
    }
}
