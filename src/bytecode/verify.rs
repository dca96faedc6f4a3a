use crate::bytecode::compile_error::CompileError;
use crate::bytecode::labels::LabelTable;

/// Fails on the first label, in first-reference order, that was referenced
/// but never marked.
pub fn verify_labels(labels: &LabelTable) -> Result<(), CompileError> {
    match labels.iter().find(|(_, entry)| !entry.defined) {
        Some((label, _)) => Err(CompileError::UndefinedLabel(label.to_string())),
        None => Ok(()),
    }
}
