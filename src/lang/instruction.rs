use super::literal::BitString;

/// The 22 Whitespace operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // stack
    Push,
    Dup,
    Swap,
    Pop,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // heap
    Store,
    Load,

    // flow control
    Mark,
    Call,
    Jump,
    JumpIfZero,
    JumpIfNegative,
    Return,
    End,

    // I/O
    WriteChar,
    WriteNumber,
    ReadChar,
    ReadNumber,
}

/// What kind of literal, if any, follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    None,
    Number,
    Label,
}

impl Opcode {
    pub const ALL: [Opcode; 22] = [
        Opcode::Push,
        Opcode::Dup,
        Opcode::Swap,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Store,
        Opcode::Load,
        Opcode::Mark,
        Opcode::Call,
        Opcode::Jump,
        Opcode::JumpIfZero,
        Opcode::JumpIfNegative,
        Opcode::Return,
        Opcode::End,
        Opcode::WriteChar,
        Opcode::WriteNumber,
        Opcode::ReadChar,
        Opcode::ReadNumber,
    ];

    /// Listing mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "push",
            Opcode::Dup => "dup",
            Opcode::Swap => "swap",
            Opcode::Pop => "pop",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Store => "sth",
            Opcode::Load => "ldh",
            Opcode::Mark => "mrk",
            Opcode::Call => "call",
            Opcode::Jump => "jmp",
            Opcode::JumpIfZero => "jz",
            Opcode::JumpIfNegative => "jlz",
            Opcode::Return => "ret",
            Opcode::End => "end",
            Opcode::WriteChar => "wrc",
            Opcode::WriteNumber => "wri",
            Opcode::ReadChar => "rdc",
            Opcode::ReadNumber => "rdi",
        }
    }

    pub fn from_mnemonic(text: &str) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.mnemonic() == text)
    }

    pub fn param_kind(self) -> ParamKind {
        match self {
            Opcode::Push => ParamKind::Number,
            Opcode::Mark
            | Opcode::Call
            | Opcode::Jump
            | Opcode::JumpIfZero
            | Opcode::JumpIfNegative => ParamKind::Label,
            _ => ParamKind::None,
        }
    }

    /// Source bytes selecting this opcode (family selector + command).
    pub fn encoding(self) -> &'static [u8] {
        match self {
            Opcode::Push => b"  ",
            Opcode::Dup => b" \n ",
            Opcode::Swap => b" \n\t",
            Opcode::Pop => b" \n\n",
            Opcode::Add => b"\t   ",
            Opcode::Sub => b"\t  \t",
            Opcode::Mul => b"\t  \n",
            Opcode::Div => b"\t \t ",
            Opcode::Mod => b"\t \t\t",
            Opcode::Store => b"\t\t ",
            Opcode::Load => b"\t\t\t",
            Opcode::Mark => b"\n  ",
            Opcode::Call => b"\n \t",
            Opcode::Jump => b"\n \n",
            Opcode::JumpIfZero => b"\n\t ",
            Opcode::JumpIfNegative => b"\n\t\t",
            Opcode::Return => b"\n\t\n",
            Opcode::End => b"\n\n\n",
            Opcode::WriteChar => b"\t\n  ",
            Opcode::WriteNumber => b"\t\n \t",
            Opcode::ReadChar => b"\t\n\t ",
            Opcode::ReadNumber => b"\t\n\t\t",
        }
    }
}

/// One parsed operation. The literal stays in raw bit form until code
/// generation decodes it; `line` is where the instruction started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    param: Option<BitString>,
    line: usize,
}

impl Instruction {
    pub fn new(opcode: Opcode, line: usize) -> Self {
        Self {
            opcode,
            param: None,
            line,
        }
    }

    pub fn with_param(opcode: Opcode, param: BitString, line: usize) -> Self {
        Self {
            opcode,
            param: Some(param),
            line,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn param(&self) -> Option<&BitString> {
        self.param.as_ref()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Appends the Whitespace source form of this instruction.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.opcode.encoding());
        if self.opcode.param_kind() != ParamKind::None {
            if let Some(param) = &self.param {
                out.extend(param.bits().iter().map(|bit| bit.byte()));
            }
            out.push(b'\n');
        }
    }
}

/// Whitespace source for a whole instruction sequence.
pub fn encode_program(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for instr in instructions {
        instr.encode(&mut out);
    }
    out
}
