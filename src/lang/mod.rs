//! # Whitespace program model
//!
//! Instructions as the parser produces them, and the literal bit strings they
//! carry. Literals stay undecoded here; the bytecode compiler decides whether a
//! bit string is a number or a label.

pub mod instruction;
pub mod literal;
pub mod program;
