//! Instruction listings: one readable line per parsed instruction.
//!
//! Labels print as `s`/`t` strings, numbers as signed decimals. A number
//! literal too wide to decode prints as its raw bits behind a `b:` prefix, so
//! every listing can be read back by [`parse_listing`].

use crate::lang::instruction::{Instruction, Opcode, ParamKind};
use crate::lang::literal::{BitString, Word};
use crate::lang::program::Program;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    #[error("{line}: unknown mnemonic '{text}'")]
    UnknownMnemonic { line: usize, text: String },

    #[error("{line}: '{mnemonic}' needs a number")]
    MissingNumber { line: usize, mnemonic: &'static str },

    #[error("{line}: invalid parameter '{text}' for '{mnemonic}'")]
    BadParam {
        line: usize,
        mnemonic: &'static str,
        text: String,
    },

    #[error("{line}: '{mnemonic}' takes no parameter")]
    UnexpectedParam { line: usize, mnemonic: &'static str },
}

pub fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.opcode().mnemonic();
    let param = match (instr.opcode().param_kind(), instr.param()) {
        (ParamKind::Number, Some(bits)) => match bits.decode_number() {
            Ok(n) => n.to_string(),
            Err(_) => format!("b:{}", bits),
        },
        (ParamKind::Label, Some(bits)) if !bits.is_empty() => bits.to_string(),
        _ => String::new(),
    };

    if param.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{} {}", mnemonic, param)
    }
}

/// Renders the whole program, one instruction per line.
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    for instr in &program.instructions {
        out.push_str(&format_instruction(instr));
        out.push('\n');
    }
    out
}

/// One line per `mrk`: instruction index, source line and label. A mark
/// overridden by a later mark of the same label names the index that won.
pub fn label_table(program: &Program) -> String {
    let mut out = String::new();

    for (index, instr) in program.instructions.iter().enumerate() {
        let Some(label) = instr.param().filter(|_| instr.opcode() == Opcode::Mark) else {
            continue;
        };

        let name = if label.is_empty() {
            "(empty)".to_string()
        } else {
            label.to_string()
        };
        out.push_str(&format!("{:04} line {:<5} {}", index, instr.line(), name));

        if let Some(&winner) = program.labels.get(label).filter(|&&winner| winner != index) {
            out.push_str(&format!(" ; overridden by {:04}", winner));
        }
        out.push('\n');
    }

    out
}

/// Reads a listing back into instructions. Blank lines and text after `;`
/// are ignored. A label opcode with no parameter gets the empty label.
pub fn parse_listing(text: &str) -> Result<Vec<Instruction>, ListingError> {
    let mut instructions = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let code = raw.split(';').next().unwrap_or_default().trim();
        if code.is_empty() {
            continue;
        }

        let mut parts = code.split_whitespace();
        let word = parts.next().unwrap_or_default();
        let opcode = Opcode::from_mnemonic(word).ok_or_else(|| ListingError::UnknownMnemonic {
            line,
            text: word.to_string(),
        })?;
        let param = parts.next();
        let mnemonic = opcode.mnemonic();

        if let Some(extra) = parts.next() {
            return Err(ListingError::BadParam {
                line,
                mnemonic,
                text: extra.to_string(),
            });
        }

        let instr = match (opcode.param_kind(), param) {
            (ParamKind::None, None) => Instruction::new(opcode, line),
            (ParamKind::None, Some(_)) => {
                return Err(ListingError::UnexpectedParam { line, mnemonic });
            }
            (ParamKind::Number, None) => return Err(ListingError::MissingNumber { line, mnemonic }),
            (ParamKind::Number, Some(text)) => {
                Instruction::with_param(opcode, parse_number(text, line, mnemonic)?, line)
            }
            (ParamKind::Label, None) => Instruction::with_param(opcode, BitString::new(), line),
            (ParamKind::Label, Some(text)) => {
                let label = BitString::from_label_name(text).ok_or_else(|| ListingError::BadParam {
                    line,
                    mnemonic,
                    text: text.to_string(),
                })?;
                Instruction::with_param(opcode, label, line)
            }
        };
        instructions.push(instr);
    }

    Ok(instructions)
}

fn parse_number(text: &str, line: usize, mnemonic: &'static str) -> Result<BitString, ListingError> {
    let bad = || ListingError::BadParam {
        line,
        mnemonic,
        text: text.to_string(),
    };

    match text.strip_prefix("b:") {
        Some(raw) => BitString::from_label_name(raw).ok_or_else(bad),
        None => text.parse::<Word>().map(BitString::from_number).map_err(|_| bad()),
    }
}
