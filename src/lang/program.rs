use std::collections::HashMap;

use super::{instruction::Instruction, literal::BitString};

/// A parsed Whitespace program.
///
/// `labels` maps each marked label to the index of its `mark` instruction.
/// A label marked twice keeps the later index.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: HashMap<BitString, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `label` as marked at the next instruction slot.
    pub fn mark(&mut self, label: &BitString) {
        self.labels.insert(label.clone(), self.instructions.len());
    }

    pub fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
