pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod labels;
pub mod op;
pub mod stack_check;
pub mod verify;

pub use ir::{CodeObject, ProgramBc};
pub use op::Op;
