pub mod runtime_error;
pub mod vm_bc;

pub use vm_bc::{VmBc, VmConfig};
