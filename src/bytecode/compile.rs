use crate::{
    bytecode::{
        CodeObject, Op, ProgramBc,
        compile_error::CompileError,
        labels::{LabelTable, Target, Targets},
        verify::verify_labels,
    },
    lang::{
        instruction::{Instruction, Opcode},
        literal::BitString,
        program::Program,
    },
};

/// Lowers a parsed program into flat bytecode.
///
/// Labels become targets that are placed when their `mark` is reached and
/// patched into relative offsets once everything has been emitted, so
/// forward and backward references look the same.
///
/// `call`/`ret` do not map onto anything native. Each call pushes its
/// return-site index on the VM's return-address stack and jumps; the op right
/// after the jump is that site. Every `ret` jumps to a single dispatcher
/// emitted after the program body, which pops the index and branches through
/// a table of all return sites in call order.
pub struct Compiler {
    ops: Vec<Op>,
    targets: Targets,
    labels: LabelTable,

    /// Branch ops waiting for their target's address.
    fixups: Vec<(usize, Target)>,

    /// One target per `call`, in encounter order.
    return_sites: Vec<Target>,

    /// Target of the shared return dispatcher, allocated by the first `ret`.
    dispatcher: Option<Target>,

    /// Naive running height, for diagnostics only.
    stack_height: i64,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            targets: Targets::new(),
            labels: LabelTable::new(),
            fixups: Vec::new(),
            return_sites: Vec::new(),
            dispatcher: None,
            stack_height: 0,
        }
    }

    pub fn compile(mut self, program: &Program) -> Result<ProgramBc, CompileError> {
        for (index, instr) in program.instructions.iter().enumerate() {
            self.compile_instruction(instr)?;
            tracing::trace!(
                index,
                op = instr.opcode().mnemonic(),
                height = self.stack_height,
                "lowered"
            );
        }

        // Falling off the end behaves like `end`.
        self.ops.push(Op::Halt);

        let dispatcher_addr = self.emit_dispatcher();

        verify_labels(&self.labels)?;
        self.resolve_fixups()?;

        tracing::debug!(
            instructions = program.instructions.len(),
            ops = self.ops.len(),
            labels = self.labels.len(),
            return_sites = self.return_sites.len(),
            final_height = self.stack_height,
            "code generation finished"
        );

        Ok(ProgramBc {
            main: CodeObject { ops: self.ops },
            return_sites: self.return_sites.len() as u32,
            dispatcher: dispatcher_addr,
            source_instructions: program.instructions.len(),
        })
    }

    fn compile_instruction(&mut self, instr: &Instruction) -> Result<(), CompileError> {
        match instr.opcode() {
            Opcode::Push => {
                let value = literal(instr)?
                    .decode_number()
                    .map_err(|e| CompileError::LiteralOverflow {
                        line: instr.line(),
                        bits: e.bits,
                    })?;
                self.emit(Op::Push(value), 1);
            }

            // Stack ops
            Opcode::Dup => self.emit(Op::Dup, 1),
            Opcode::Swap => self.emit(Op::Swap, 0),
            Opcode::Pop => self.emit(Op::Drop, -1),

            // Arithmetic
            Opcode::Add => self.emit(Op::Add, -1),
            Opcode::Sub => self.emit(Op::Sub, -1),
            Opcode::Mul => self.emit(Op::Mul, -1),
            Opcode::Div => self.emit(Op::Div, -1),
            Opcode::Mod => self.emit(Op::Mod, -1),

            // Heap
            Opcode::Store => self.emit(Op::Store, -2),
            Opcode::Load => self.emit(Op::Load, 0),

            // Flow control
            Opcode::Mark => {
                let label = literal(instr)?;
                let entry = self.labels.entry(label, &mut self.targets);
                if entry.defined {
                    return Err(CompileError::DuplicateLabel {
                        label: label.to_string(),
                        line: instr.line(),
                    });
                }
                entry.defined = true;
                let target = entry.target;
                self.place(target);
            }
            Opcode::Call => {
                let callee = self.label_target(literal(instr)?);
                let site = self.return_sites.len() as u32;
                self.emit(Op::PushReturn(site), 0);
                self.emit_branch(Op::Jump(0), callee, 0);

                let return_site = self.targets.allocate();
                self.place(return_site);
                self.return_sites.push(return_site);
            }
            Opcode::Jump => {
                let target = self.label_target(literal(instr)?);
                self.emit_branch(Op::Jump(0), target, 0);
            }
            Opcode::JumpIfZero => {
                let target = self.label_target(literal(instr)?);
                self.emit_branch(Op::JumpIfZero(0), target, -1);
            }
            Opcode::JumpIfNegative => {
                let target = self.label_target(literal(instr)?);
                self.emit_branch(Op::JumpIfNeg(0), target, -1);
            }
            Opcode::Return => {
                let dispatcher = match self.dispatcher {
                    Some(target) => target,
                    None => {
                        let target = self.targets.allocate();
                        self.dispatcher = Some(target);
                        target
                    }
                };
                self.emit_branch(Op::Jump(0), dispatcher, 0);
            }
            Opcode::End => {
                self.emit(Op::Halt, 0);
                self.stack_height = 0;
            }

            // I/O
            Opcode::WriteChar => self.emit(Op::WriteChar, -1),
            Opcode::WriteNumber => self.emit(Op::WriteNum, -1),
            Opcode::ReadChar => self.emit(Op::ReadChar, -1),
            Opcode::ReadNumber => self.emit(Op::ReadNum, -1),
        }

        Ok(())
    }

    fn emit(&mut self, op: Op, height_delta: i64) {
        self.ops.push(op);
        self.stack_height += height_delta;
    }

    /// Emits a branch with a placeholder offset, patched by `resolve_fixups`.
    fn emit_branch(&mut self, op: Op, target: Target, height_delta: i64) {
        self.fixups.push((self.ops.len(), target));
        self.emit(op, height_delta);
    }

    /// Attaches `target` to the next op to be emitted.
    fn place(&mut self, target: Target) {
        self.targets.place(target, self.ops.len());
    }

    fn label_target(&mut self, label: &BitString) -> Target {
        self.labels.entry(label, &mut self.targets).target
    }

    /// Emits the shared return dispatcher if any `call` or `ret` exists.
    ///
    /// ```text
    ///   D: DISPATCH [site0 - D, site1 - D, ...]
    /// ```
    /// The return-address stack holds site indices, so the table is exactly
    /// the return-site list in call order.
    fn emit_dispatcher(&mut self) -> Option<usize> {
        if self.return_sites.is_empty() && self.dispatcher.is_none() {
            return None;
        }

        let address = self.ops.len();
        let table = self
            .return_sites
            .iter()
            .map(|&site| match self.targets.address(site) {
                Some(site_addr) => relative(address, site_addr),
                None => 0,
            })
            .collect();

        if let Some(target) = self.dispatcher {
            self.targets.place(target, address);
        }
        self.ops.push(Op::Dispatch(table));
        Some(address)
    }

    fn resolve_fixups(&mut self) -> Result<(), CompileError> {
        for &(at, target) in &self.fixups {
            let address = self.targets.address(target).ok_or_else(|| {
                CompileError::Internal(format!("branch at {} has an unplaced target", at))
            })?;
            self.ops[at].set_branch_offset(relative(at, address));
        }
        Ok(())
    }
}

fn relative(from: usize, to: usize) -> i32 {
    to as i32 - from as i32
}

fn literal(instr: &Instruction) -> Result<&BitString, CompileError> {
    instr.param().ok_or_else(|| CompileError::MissingLiteral {
        line: instr.line(),
        mnemonic: instr.opcode().mnemonic(),
    })
}
