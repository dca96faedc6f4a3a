use serde::{Deserialize, Serialize};

use crate::lang::literal::Word;

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // literals
    Push(Word),

    // stack ops
    Dup,
    Swap,
    Drop,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // heap
    Store, // ( addr value -- )
    Load,  // ( addr -- value )

    // ==========================================================================
    // Flat control flow. Offsets are relative: target = ip + offset.
    // ==========================================================================
    Jump(i32),

    /// Pop, jump if zero. Otherwise continue to the next instruction.
    JumpIfZero(i32),

    /// Pop, jump if negative. Otherwise continue to the next instruction.
    JumpIfNeg(i32),

    /// Push a return-site index onto the return-address stack.
    PushReturn(u32),

    /// Pop a return-site index `k` from the return-address stack and jump by
    /// `table[k]`. The only multiway branch; every `ret` jumps here.
    Dispatch(Vec<i32>),

    // I/O
    WriteChar,
    WriteNum,
    ReadChar, // ( addr -- )
    ReadNum,  // ( addr -- )

    Halt,
}

impl Op {
    /// Returns (pops, pushes) on the operand stack.
    pub fn effect(&self) -> (u32, u32) {
        use Op::*;
        match self {
            Push(_) => (0, 1),
            Dup => (1, 2),
            Swap => (2, 2),
            Drop => (1, 0),
            Add | Sub | Mul | Div | Mod => (2, 1),
            Store => (2, 0),
            Load => (1, 1),
            Jump(_) => (0, 0),
            JumpIfZero(_) | JumpIfNeg(_) => (1, 0),
            PushReturn(_) | Dispatch(_) => (0, 0),
            WriteChar | WriteNum => (1, 0),
            ReadChar | ReadNum => (1, 0),
            Halt => (0, 0),
        }
    }

    /// Relative offset of a single-target branch.
    pub fn branch_offset(&self) -> Option<i32> {
        match self {
            Op::Jump(offset) | Op::JumpIfZero(offset) | Op::JumpIfNeg(offset) => Some(*offset),
            _ => None,
        }
    }

    /// Rewrites the offset of a single-target branch; other ops are untouched.
    pub fn set_branch_offset(&mut self, new_offset: i32) {
        if let Op::Jump(offset) | Op::JumpIfZero(offset) | Op::JumpIfNeg(offset) = self {
            *offset = new_offset;
        }
    }

    /// Whether execution can continue at `ip + 1`.
    pub fn falls_through(&self) -> bool {
        !matches!(self, Op::Jump(_) | Op::Dispatch(_) | Op::Halt)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Push(_) => "PUSH",
            Op::Dup => "DUP",
            Op::Swap => "SWAP",
            Op::Drop => "DROP",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Store => "STORE",
            Op::Load => "LOAD",
            Op::Jump(_) => "JUMP",
            Op::JumpIfZero(_) => "JUMP_ZERO",
            Op::JumpIfNeg(_) => "JUMP_NEG",
            Op::PushReturn(_) => "PUSH_RET",
            Op::Dispatch(_) => "DISPATCH",
            Op::WriteChar => "WRITE_CHAR",
            Op::WriteNum => "WRITE_NUM",
            Op::ReadChar => "READ_CHAR",
            Op::ReadNum => "READ_NUM",
            Op::Halt => "HALT",
        }
    }
}
