use crate::bytecode::ProgramBc;
use crate::bytecode::op::Op;
use crate::lang::literal::Word;
use crate::runtime::runtime_error::RuntimeError;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub max_steps: Option<u64>,
    /// Capacity of the return-address stack.
    pub max_call_depth: usize,
    pub max_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_steps: None,
            max_call_depth: 10_000,
            max_stack_size: 1_000_000,
        }
    }
}

/// Executes a `ProgramBc` against an input reader and an output writer.
pub struct VmBc<R, W> {
    stack: Vec<Word>,
    /// Allocated on first heap access.
    heap: Option<HashMap<Word, Word>>,
    /// Return-site indices pushed by `PushReturn`, popped by `Dispatch`.
    returns: Vec<u32>,
    input: R,
    output: W,
    // Safety limits
    config: VmConfig,
    steps: u64,
}

impl<R: BufRead, W: Write> VmBc<R, W> {
    pub fn with_config(input: R, output: W, config: VmConfig) -> Self {
        Self {
            stack: Vec::new(),
            heap: None,
            returns: Vec::new(),
            input,
            output,
            config,
            steps: 0,
        }
    }

    #[allow(dead_code)]
    pub fn stack(&self) -> &[Word] {
        &self.stack
    }

    pub fn heap_value(&self, address: Word) -> Option<Word> {
        self.heap.as_ref()?.get(&address).copied()
    }

    #[allow(dead_code)]
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.heap = None;
        self.returns.clear();
        self.steps = 0;
    }

    pub fn run(&mut self, prog: &ProgramBc) -> Result<(), RuntimeError> {
        self.reset_execution_state();

        tracing::debug!(ops = prog.main.ops.len(), "running bytecode");
        let result = self.exec_ops(&prog.main.ops);
        self.output.flush()?;

        tracing::debug!(
            steps = self.steps,
            stack = self.stack.len(),
            ok = result.is_ok(),
            "execution finished"
        );
        result
    }

    // Execution

    fn check_limits(&mut self, ip: usize) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimit(max));
            }
        }

        if self.stack.len() > self.config.max_stack_size {
            return Err(RuntimeError::StackLimit {
                address: ip,
                limit: self.config.max_stack_size,
            });
        }

        Ok(())
    }

    fn exec_ops(&mut self, ops: &[Op]) -> Result<(), RuntimeError> {
        let mut ip: usize = 0;

        while ip < ops.len() {
            self.check_limits(ip)?;

            match &ops[ip] {
                // Literals
                Op::Push(n) => self.push(*n),

                // Stack operations
                Op::Dup => {
                    let a = self.pop(ip)?;
                    self.push(a);
                    self.push(a);
                }
                Op::Swap => {
                    let b = self.pop(ip)?;
                    let a = self.pop(ip)?;
                    self.push(b);
                    self.push(a);
                }
                Op::Drop => {
                    self.pop(ip)?;
                }

                // Arithmetic
                Op::Add => {
                    let (a, b) = self.pop_two(ip)?;
                    self.push(a.wrapping_add(b));
                }
                Op::Sub => {
                    let (a, b) = self.pop_two(ip)?;
                    self.push(a.wrapping_sub(b));
                }
                Op::Mul => {
                    let (a, b) = self.pop_two(ip)?;
                    self.push(a.wrapping_mul(b));
                }
                Op::Div => {
                    let (a, b) = self.pop_two(ip)?;
                    let result = a.checked_div(b).ok_or_else(|| division_error(b, ip))?;
                    self.push(result);
                }
                Op::Mod => {
                    let (a, b) = self.pop_two(ip)?;
                    let result = a.checked_rem(b).ok_or_else(|| division_error(b, ip))?;
                    self.push(result);
                }

                // Heap
                Op::Store => {
                    let value = self.pop(ip)?;
                    let address = self.pop(ip)?;
                    self.store(address, value);
                }
                Op::Load => {
                    let address = self.pop(ip)?;
                    let value = self.heap_value(address).ok_or(
                        RuntimeError::UndefinedHeapAddress {
                            address: ip,
                            heap_address: address,
                        },
                    )?;
                    self.push(value);
                }

                // Jump instructions
                Op::Jump(offset) => {
                    ip = jump_target(ip, *offset, ops.len())?;
                    continue;
                }
                Op::JumpIfZero(offset) => {
                    if self.pop(ip)? == 0 {
                        ip = jump_target(ip, *offset, ops.len())?;
                        continue;
                    }
                }
                Op::JumpIfNeg(offset) => {
                    if self.pop(ip)? < 0 {
                        ip = jump_target(ip, *offset, ops.len())?;
                        continue;
                    }
                }

                // Call / return
                Op::PushReturn(site) => {
                    if self.returns.len() >= self.config.max_call_depth {
                        return Err(RuntimeError::CallDepthExceeded {
                            address: ip,
                            limit: self.config.max_call_depth,
                        });
                    }
                    self.returns.push(*site);
                }
                Op::Dispatch(table) => {
                    let site = self
                        .returns
                        .pop()
                        .ok_or(RuntimeError::ReturnStackUnderflow { address: ip })?;
                    let offset = table
                        .get(site as usize)
                        .ok_or(RuntimeError::UnknownReturnSite { address: ip, site })?;
                    ip = jump_target(ip, *offset, ops.len())?;
                    continue;
                }

                // I/O
                Op::WriteChar => {
                    let n = self.pop(ip)?;
                    let ch = char::decode_utf16([n as u16])
                        .next()
                        .and_then(Result::ok)
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    write!(self.output, "{}", ch)?;
                }
                Op::WriteNum => {
                    let n = self.pop(ip)?;
                    write!(self.output, "{}", n)?;
                }
                Op::ReadChar => {
                    let address = self.pop(ip)?;
                    self.output.flush()?;
                    let value = match read_utf8_char(&mut self.input)? {
                        Some(ch) => ch as Word,
                        None => -1,
                    };
                    self.store(address, value);
                }
                Op::ReadNum => {
                    let address = self.pop(ip)?;
                    self.output.flush()?;

                    let mut line = String::new();
                    if self.input.read_line(&mut line)? == 0 {
                        return Err(RuntimeError::UnexpectedEndOfInput { address: ip });
                    }
                    let text = line.trim();
                    let value = text.parse::<Word>().map_err(|_| RuntimeError::InvalidNumber {
                        address: ip,
                        text: text.to_string(),
                    })?;
                    self.store(address, value);
                }

                Op::Halt => return Ok(()),
            }

            ip += 1;
        }

        Ok(())
    }

    // Stack operations

    fn push(&mut self, value: Word) {
        self.stack.push(value);
    }

    fn pop(&mut self, ip: usize) -> Result<Word, RuntimeError> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { address: ip })
    }

    /// Pops `b` then `a`, returning them in push order.
    fn pop_two(&mut self, ip: usize) -> Result<(Word, Word), RuntimeError> {
        let b = self.pop(ip)?;
        let a = self.pop(ip)?;
        Ok((a, b))
    }

    fn store(&mut self, address: Word, value: Word) {
        self.heap
            .get_or_insert_with(HashMap::new)
            .insert(address, value);
    }
}

fn division_error(divisor: Word, ip: usize) -> RuntimeError {
    if divisor == 0 {
        RuntimeError::DivisionByZero { address: ip }
    } else {
        RuntimeError::Overflow { address: ip }
    }
}

/// Landing on `len` is allowed and ends execution.
fn jump_target(ip: usize, offset: i32, len: usize) -> Result<usize, RuntimeError> {
    let target = ip as i64 + offset as i64;
    if target < 0 || target as usize > len {
        return Err(RuntimeError::InvalidJump {
            address: ip,
            target,
        });
    }
    Ok(target as usize)
}

/// Reads exactly one UTF-8 encoded character. Malformed or truncated
/// sequences read as U+FFFD and leave the next lead byte unread; `None` at end
/// of input.
fn read_utf8_char<R: BufRead>(input: &mut R) -> std::io::Result<Option<char>> {
    let mut lead = [0u8; 1];
    if input.read(&mut lead)? == 0 {
        return Ok(None);
    }

    let width = match lead[0] {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
    };

    let mut bytes = vec![lead[0]];
    while bytes.len() < width {
        // Only continuation bytes belong to this character.
        let next = input.fill_buf()?.first().copied();
        match next {
            Some(byte @ 0x80..=0xBF) => {
                bytes.push(byte);
                input.consume(1);
            }
            _ => break,
        }
    }

    Ok(Some(
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeObject;

    // ============================================================
    // Test Helpers
    // ============================================================

    /// Create a simple program from a list of ops
    fn program_from_ops(ops: Vec<Op>) -> ProgramBc {
        ProgramBc {
            main: CodeObject { ops },
            return_sites: 0,
            dispatcher: None,
            source_instructions: 0,
        }
    }

    /// Run ops and return the resulting stack
    fn run_ops(ops: Vec<Op>) -> Result<Vec<Word>, RuntimeError> {
        run_ops_with_config(ops, VmConfig::default())
    }

    /// Run ops with custom config
    fn run_ops_with_config(ops: Vec<Op>, config: VmConfig) -> Result<Vec<Word>, RuntimeError> {
        let mut vm = VmBc::with_config(&b""[..], Vec::new(), config);
        vm.run(&program_from_ops(ops))?;
        Ok(vm.stack().to_vec())
    }

    /// Run ops against `input`, returning the result and everything written
    fn run_io(ops: Vec<Op>, input: &str) -> (Result<(), RuntimeError>, String) {
        let mut vm = VmBc::with_config(input.as_bytes(), Vec::new(), VmConfig::default());
        let result = vm.run(&program_from_ops(ops));
        let output = String::from_utf8(vm.into_output()).expect("utf-8 output");
        (result, output)
    }

    /// Assert stack contains expected values
    fn assert_stack(ops: Vec<Op>, expected: Vec<Word>) {
        let stack = run_ops(ops).expect("execution should succeed");
        assert_eq!(stack, expected, "stack mismatch");
    }

    /// Assert execution produces an error containing the given substring
    fn assert_error(ops: Vec<Op>, error_contains: &str) {
        match run_ops(ops) {
            Ok(stack) => panic!(
                "expected error containing '{}', got stack: {:?}",
                error_contains, stack
            ),
            Err(e) => assert!(
                e.to_string().contains(error_contains),
                "expected error containing '{}', got: {}",
                error_contains,
                e
            ),
        }
    }

    // ============================================================
    // Stack operations
    // ============================================================

    #[test]
    fn test_push_multiple() {
        assert_stack(vec![Op::Push(1), Op::Push(-2), Op::Push(3)], vec![1, -2, 3]);
    }

    #[test]
    fn test_dup() {
        assert_stack(vec![Op::Push(5), Op::Dup], vec![5, 5]);
    }

    #[test]
    fn test_dup_empty_stack() {
        assert_error(vec![Op::Dup], "stack underflow");
    }

    #[test]
    fn test_swap() {
        assert_stack(vec![Op::Push(1), Op::Push(2), Op::Swap], vec![2, 1]);
    }

    #[test]
    fn test_swap_insufficient_stack() {
        assert!(matches!(
            run_ops(vec![Op::Push(1), Op::Swap]),
            Err(RuntimeError::StackUnderflow { address: 1 })
        ));
    }

    #[test]
    fn test_drop() {
        assert_stack(vec![Op::Push(1), Op::Push(2), Op::Drop], vec![1]);
    }

    #[test]
    fn test_drop_empty_stack() {
        assert_error(vec![Op::Drop], "stack underflow");
    }

    // ============================================================
    // Arithmetic
    // ============================================================

    #[test]
    fn test_sub_operand_order() {
        assert_stack(vec![Op::Push(10), Op::Push(3), Op::Sub], vec![7]);
    }

    #[test]
    fn test_add_wraps() {
        assert_stack(
            vec![Op::Push(Word::MAX), Op::Push(1), Op::Add],
            vec![Word::MIN],
        );
    }

    #[test]
    fn test_mul_wraps() {
        assert_stack(
            vec![Op::Push(0x10000), Op::Push(0x10000), Op::Mul],
            vec![0],
        );
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        assert_stack(vec![Op::Push(-7), Op::Push(2), Op::Div], vec![-3]);
    }

    #[test]
    fn test_mod_sign_follows_dividend() {
        assert_stack(vec![Op::Push(-7), Op::Push(3), Op::Mod], vec![-1]);
        assert_stack(vec![Op::Push(7), Op::Push(-3), Op::Mod], vec![1]);
    }

    #[test]
    fn test_div_by_zero() {
        assert!(matches!(
            run_ops(vec![Op::Push(1), Op::Push(0), Op::Div]),
            Err(RuntimeError::DivisionByZero { address: 2 })
        ));
    }

    #[test]
    fn test_mod_by_zero() {
        assert_error(vec![Op::Push(1), Op::Push(0), Op::Mod], "division by zero");
    }

    #[test]
    fn test_div_min_by_minus_one() {
        assert!(matches!(
            run_ops(vec![Op::Push(Word::MIN), Op::Push(-1), Op::Div]),
            Err(RuntimeError::Overflow { .. })
        ));
    }

    // ============================================================
    // Heap
    // ============================================================

    #[test]
    fn test_store_then_load() {
        assert_stack(
            vec![
                Op::Push(3),
                Op::Push(7),
                Op::Store,
                Op::Push(3),
                Op::Load,
            ],
            vec![7],
        );
    }

    #[test]
    fn test_store_overwrites() {
        assert_stack(
            vec![
                Op::Push(-1),
                Op::Push(1),
                Op::Store,
                Op::Push(-1),
                Op::Push(2),
                Op::Store,
                Op::Push(-1),
                Op::Load,
            ],
            vec![2],
        );
    }

    #[test]
    fn test_load_unset_address() {
        assert!(matches!(
            run_ops(vec![Op::Push(9), Op::Load]),
            Err(RuntimeError::UndefinedHeapAddress {
                address: 1,
                heap_address: 9
            })
        ));
    }

    #[test]
    fn test_heap_is_lazy() {
        let mut vm = VmBc::with_config(&b""[..], Vec::new(), VmConfig::default());
        vm.run(&program_from_ops(vec![Op::Push(1)])).expect("runs");
        assert!(vm.heap.is_none());

        vm.run(&program_from_ops(vec![Op::Push(1), Op::Push(2), Op::Store]))
            .expect("runs");
        assert_eq!(vm.heap_value(1), Some(2));
    }

    // ============================================================
    // Jumps
    // ============================================================

    #[test]
    fn test_jump_forward() {
        assert_stack(
            vec![Op::Jump(2), Op::Push(1), Op::Push(2)],
            vec![2],
        );
    }

    #[test]
    fn test_jump_if_zero() {
        let ops = |n| vec![Op::Push(n), Op::JumpIfZero(2), Op::Push(1), Op::Push(2)];
        assert_stack(ops(0), vec![2]);
        assert_stack(ops(5), vec![1, 2]);
    }

    #[test]
    fn test_jump_if_negative() {
        let ops = |n| vec![Op::Push(n), Op::JumpIfNeg(2), Op::Push(1), Op::Push(2)];
        assert_stack(ops(-1), vec![2]);
        assert_stack(ops(0), vec![1, 2]);
    }

    #[test]
    fn test_jump_out_of_bounds() {
        assert!(matches!(
            run_ops(vec![Op::Jump(-1)]),
            Err(RuntimeError::InvalidJump {
                address: 0,
                target: -1
            })
        ));
    }

    #[test]
    fn test_halt_stops_execution() {
        assert_stack(vec![Op::Push(1), Op::Halt, Op::Push(2)], vec![1]);
    }

    // ============================================================
    // Call / return
    // ============================================================

    #[test]
    fn test_dispatch_returns_to_pushed_site() {
        // 0 PUSH_RET 1
        // 1 JUMP -> 5
        // 2 PUSH 10    (site 0)
        // 3 HALT
        // 4 PUSH 20    (site 1)
        // 5 DISPATCH [2, 4]
        let ops = vec![
            Op::PushReturn(1),
            Op::Jump(4),
            Op::Push(10),
            Op::Halt,
            Op::Push(20),
            Op::Dispatch(vec![-3, -1]),
        ];
        // site 1 lands on PUSH 20 then falls into DISPATCH with an empty
        // return stack
        assert!(matches!(
            run_ops(ops),
            Err(RuntimeError::ReturnStackUnderflow { address: 5 })
        ));
    }

    #[test]
    fn test_unknown_return_site() {
        let ops = vec![Op::PushReturn(3), Op::Dispatch(vec![0])];
        assert!(matches!(
            run_ops(ops),
            Err(RuntimeError::UnknownReturnSite { address: 1, site: 3 })
        ));
    }

    #[test]
    fn test_call_depth_limit() {
        let config = VmConfig {
            max_call_depth: 4,
            ..VmConfig::default()
        };
        let ops = vec![Op::PushReturn(0), Op::Jump(-1)];
        assert!(matches!(
            run_ops_with_config(ops, config),
            Err(RuntimeError::CallDepthExceeded { address: 0, limit: 4 })
        ));
    }

    // ============================================================
    // Limits
    // ============================================================

    #[test]
    fn test_step_limit() {
        let config = VmConfig {
            max_steps: Some(50),
            ..VmConfig::default()
        };
        assert!(matches!(
            run_ops_with_config(vec![Op::Jump(0)], config),
            Err(RuntimeError::StepLimit(50))
        ));
    }

    #[test]
    fn test_stack_limit() {
        let config = VmConfig {
            max_stack_size: 8,
            ..VmConfig::default()
        };
        assert!(matches!(
            run_ops_with_config(vec![Op::Push(1), Op::Jump(-1)], config),
            Err(RuntimeError::StackLimit { limit: 8, .. })
        ));
    }

    // ============================================================
    // I/O
    // ============================================================

    #[test]
    fn test_write_number() {
        let (result, out) = run_io(vec![Op::Push(-42), Op::WriteNum], "");
        assert!(result.is_ok());
        assert_eq!(out, "-42");
    }

    #[test]
    fn test_write_char() {
        let (_, out) = run_io(vec![Op::Push(72), Op::WriteChar, Op::Push(0x263A), Op::WriteChar], "");
        assert_eq!(out, "H\u{263A}");
    }

    #[test]
    fn test_write_char_truncates_to_code_unit() {
        let (_, out) = run_io(vec![Op::Push(0x10041), Op::WriteChar], "");
        assert_eq!(out, "A");
    }

    #[test]
    fn test_write_char_lone_surrogate() {
        let (_, out) = run_io(vec![Op::Push(0xD800), Op::WriteChar], "");
        assert_eq!(out, "\u{FFFD}");
    }

    #[test]
    fn test_read_char_stores_code_point() {
        let ops = vec![
            Op::Push(0),
            Op::ReadChar,
            Op::Push(1),
            Op::ReadChar,
            Op::Push(0),
            Op::Load,
            Op::Push(1),
            Op::Load,
        ];
        let mut vm = VmBc::with_config("éx".as_bytes(), Vec::new(), VmConfig::default());
        vm.run(&program_from_ops(ops)).expect("runs");
        assert_eq!(vm.stack(), &[0xE9, 'x' as Word]);
    }

    #[test]
    fn test_read_char_at_eof() {
        let ops = vec![Op::Push(5), Op::ReadChar, Op::Push(5), Op::Load];
        let mut vm = VmBc::with_config(&b""[..], Vec::new(), VmConfig::default());
        vm.run(&program_from_ops(ops)).expect("runs");
        assert_eq!(vm.stack(), &[-1]);
    }

    #[test]
    fn test_read_char_malformed() {
        let mut input = &[0xFFu8, b'a'][..];
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{FFFD}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('a'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), None);
    }

    #[test]
    fn test_read_char_truncated_sequence_keeps_next_char() {
        let mut input = &[0xC3u8, b'a', b'b'][..];
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{FFFD}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('a'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('b'));

        let mut input = &[0xE2u8, 0x98, b'x'][..];
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{FFFD}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('x'));

        let mut input = &[0xC3u8][..];
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{FFFD}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), None);
    }

    #[test]
    fn test_read_char_multibyte() {
        let mut input = "\u{263A}\u{1F600}".as_bytes();
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{263A}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), Some('\u{1F600}'));
        assert_eq!(read_utf8_char(&mut input).expect("reads"), None);
    }

    #[test]
    fn test_read_number() {
        let ops = vec![Op::Push(2), Op::ReadNum, Op::Push(2), Op::Load];
        let mut vm = VmBc::with_config(&b"  -17 \r\nrest"[..], Vec::new(), VmConfig::default());
        vm.run(&program_from_ops(ops)).expect("runs");
        assert_eq!(vm.stack(), &[-17]);
    }

    #[test]
    fn test_read_number_invalid() {
        let (result, _) = run_io(vec![Op::Push(0), Op::ReadNum], "12a\n");
        match result {
            Err(RuntimeError::InvalidNumber { address, text }) => {
                assert_eq!(address, 1);
                assert_eq!(text, "12a");
            }
            other => panic!("expected InvalidNumber, got {:?}", other),
        }
    }

    #[test]
    fn test_read_number_at_eof() {
        let (result, _) = run_io(vec![Op::Push(0), Op::ReadNum], "");
        assert!(matches!(
            result,
            Err(RuntimeError::UnexpectedEndOfInput { address: 1 })
        ));
    }

    #[test]
    fn test_output_flushed_on_error() {
        let (result, out) = run_io(vec![Op::Push(7), Op::WriteNum, Op::Drop], "");
        assert!(result.is_err());
        assert_eq!(out, "7");
    }
}
