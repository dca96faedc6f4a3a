use crate::lang::literal::Word;

/// A fault raised while executing bytecode. `address` is the op that faulted.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime error at {address:04}: stack underflow")]
    StackUnderflow { address: usize },

    #[error("runtime error at {address:04}: division by zero")]
    DivisionByZero { address: usize },

    #[error("runtime error at {address:04}: arithmetic overflow")]
    Overflow { address: usize },

    #[error("runtime error at {address:04}: heap address {heap_address} was never stored to")]
    UndefinedHeapAddress { address: usize, heap_address: Word },

    #[error("runtime error at {address:04}: return without a matching call")]
    ReturnStackUnderflow { address: usize },

    #[error("runtime error at {address:04}: return site {site} does not exist")]
    UnknownReturnSite { address: usize, site: u32 },

    #[error("runtime error at {address:04}: call depth limit exceeded ({limit})")]
    CallDepthExceeded { address: usize, limit: usize },

    #[error("runtime error at {address:04}: stack size limit exceeded ({limit})")]
    StackLimit { address: usize, limit: usize },

    #[error("runtime error: execution step limit exceeded ({0})")]
    StepLimit(u64),

    #[error("runtime error at {address:04}: cannot read number from {text:?}")]
    InvalidNumber { address: usize, text: String },

    #[error("runtime error at {address:04}: unexpected end of input")]
    UnexpectedEndOfInput { address: usize },

    #[error("runtime error at {address:04}: jump out of bounds (target {target})")]
    InvalidJump { address: usize, target: i64 },

    #[error("runtime error: i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_address() {
        let err = RuntimeError::StackUnderflow { address: 12 };
        assert_eq!(err.to_string(), "runtime error at 0012: stack underflow");
    }

    #[test]
    fn test_invalid_number_quotes_text() {
        let err = RuntimeError::InvalidNumber {
            address: 3,
            text: "4x".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "runtime error at 0003: cannot read number from \"4x\""
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: RuntimeError = io.into();
        assert!(matches!(err, RuntimeError::Io(_)));
    }
}
