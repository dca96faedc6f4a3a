use crate::bytecode::{
    ProgramBc, compile::Compiler, compile_error::CompileError, stack_check,
    stack_check::StackCheckError,
};
use crate::frontend::{parser::parse_source, parser_error::ParseError};

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Fail the build when the static stack check finds a possible underflow
    /// instead of only warning.
    pub strict_stack: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    StackCheck(#[from] StackCheckError),
}

/// Source bytes to verified bytecode.
pub fn compile_source(source: &[u8], options: &CompileOptions) -> Result<ProgramBc, BuildError> {
    let program = parse_source(source)
        .inspect_err(|e| tracing::debug!(line = e.line(), "parse failed"))?;
    if program.is_empty() {
        tracing::info!("source contains no instructions");
    }
    tracing::debug!(
        instructions = program.len(),
        labels = program.labels.len(),
        "parsed"
    );

    let bc = Compiler::new().compile(&program)?;

    match stack_check::check(&bc) {
        Ok(()) => tracing::debug!("stack check passed"),
        Err(e) if options.strict_stack => return Err(e.into()),
        Err(e) => tracing::warn!("{e}"),
    }

    Ok(bc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Op;

    // push 1, wri, end
    const PRINT_ONE: &[u8] = b"   \t\n\t\n \t\n\n\n";

    // pop, end
    const POP_EMPTY: &[u8] = b" \n\n\n\n\n";

    #[test]
    fn test_compiles_valid_source() {
        let bc = compile_source(PRINT_ONE, &CompileOptions::default()).expect("compiles");
        assert_eq!(bc.main.ops[..3], [Op::Push(1), Op::WriteNum, Op::Halt]);
        assert_eq!(bc.source_instructions, 3);
    }

    #[test]
    fn test_source_without_instructions_compiles_to_halt() {
        let bc = compile_source(b"no_whitespace_commands,just-prose.", &CompileOptions::default())
            .expect("compiles");
        assert_eq!(bc.source_instructions, 0);
        assert_eq!(bc.main.ops, vec![Op::Halt]);
        assert_eq!(bc.dispatcher, None);
    }

    #[test]
    fn test_stack_check_warns_by_default() {
        assert!(compile_source(POP_EMPTY, &CompileOptions::default()).is_ok());
    }

    #[test]
    fn test_strict_stack_rejects_underflow() {
        let options = CompileOptions { strict_stack: true };
        assert!(matches!(
            compile_source(POP_EMPTY, &options),
            Err(BuildError::StackCheck(StackCheckError { address: 0, .. }))
        ));
    }

    #[test]
    fn test_parse_error_propagates() {
        // arithmetic family, then an unknown command
        let err = compile_source(b"\t \n", &CompileOptions::default()).expect_err("bad source");
        assert!(matches!(err, BuildError::Parse(_)));
        assert!(err.to_string().starts_with("parse error: "));
        assert!(err.to_string().contains("syntax error: unknown arithmetic operation"));
    }

    #[test]
    fn test_undefined_label_propagates() {
        // jmp to label "s", never marked
        let err = compile_source(b"\n \n \n", &CompileOptions::default()).expect_err("bad label");
        assert!(matches!(
            err,
            BuildError::Compile(CompileError::UndefinedLabel(_))
        ));
    }
}
