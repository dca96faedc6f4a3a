use crate::lang::literal::MAX_LITERAL_BITS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A `push` literal wider than the word allows.
    #[error(
        "{line}: numeric literal overflow: {bits} bits used, at most {max} allowed",
        max = MAX_LITERAL_BITS - 1
    )]
    LiteralOverflow { line: usize, bits: usize },

    /// A label referenced by control flow but never marked.
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),

    /// A second `mark` of a label already marked.
    #[error("{line}: label '{label}' is marked more than once")]
    DuplicateLabel { label: String, line: usize },

    /// An instruction that needs a literal has none.
    #[error("{line}: '{mnemonic}' is missing its literal")]
    MissingLiteral { line: usize, mnemonic: &'static str },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("internal error: {0}")]
    Internal(String),
}
