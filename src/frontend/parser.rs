use crate::frontend::parser_error::{Family, ParseError};
use crate::frontend::tokenizer::{Token, Tokenizer};
use crate::lang::instruction::{Instruction, Opcode};
use crate::lang::literal::{Bit, BitString};
use crate::lang::program::Program;

/// Recursive-descent parser for Whitespace.
///
/// Reads one token at a time from the tokenizer and never looks ahead. The
/// first token (or first two, for `Tab`) selects the instruction family; one
/// or two more select the opcode:
///
/// - `Space`: stack manipulation
/// - `Tab Space`: arithmetic
/// - `Tab Tab`: heap access
/// - `Linefeed`: flow control
/// - `Tab Linefeed`: I/O
///
/// Parsing stops cleanly only when end of input falls exactly between two
/// instructions.
pub struct Parser<'a> {
    tokens: Tokenizer<'a>,
    /// Line on which the instruction being parsed started.
    start_line: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Tokenizer<'a>) -> Self {
        Parser {
            tokens,
            start_line: 1,
        }
    }

    /// Parses the whole token stream.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();

        loop {
            self.start_line = self.tokens.line();
            match self.tokens.next_token() {
                Token::Space => self.parse_stack(&mut program)?,
                Token::Linefeed => self.parse_flow_control(&mut program)?,
                Token::Tab => match self.next()? {
                    Token::Space => self.parse_arithmetic(&mut program)?,
                    Token::Tab => self.parse_heap(&mut program)?,
                    _ => self.parse_io(&mut program)?,
                },
                Token::Eof => return Ok(program),
            }
        }
    }

    /// Next token inside an instruction; end of input here is an error, so
    /// callers never see `Eof` and match it with `_`.
    fn next(&mut self) -> Result<Token, ParseError> {
        match self.tokens.next_token() {
            Token::Eof => Err(ParseError::UnexpectedEof {
                line: self.tokens.line(),
            }),
            token => Ok(token),
        }
    }

    fn syntax(&self, family: Family) -> ParseError {
        ParseError::Syntax {
            line: self.tokens.line(),
            family,
        }
    }

    /// Reads space/tab bits up to the terminating linefeed.
    fn parse_literal(&mut self) -> Result<BitString, ParseError> {
        let mut literal = BitString::new();
        loop {
            match self.next()? {
                Token::Space => literal.push(Bit::Space),
                Token::Tab => literal.push(Bit::Tab),
                _ => return Ok(literal),
            }
        }
    }

    fn emit(&self, program: &mut Program, opcode: Opcode) {
        program.push(Instruction::new(opcode, self.start_line));
    }

    fn emit_with_literal(&mut self, program: &mut Program, opcode: Opcode) -> Result<(), ParseError> {
        let literal = self.parse_literal()?;
        if opcode == Opcode::Mark {
            program.mark(&literal);
        }
        program.push(Instruction::with_param(opcode, literal, self.start_line));
        Ok(())
    }

    fn parse_stack(&mut self, program: &mut Program) -> Result<(), ParseError> {
        match self.next()? {
            Token::Space => self.emit_with_literal(program, Opcode::Push),
            Token::Linefeed => {
                let opcode = match self.next()? {
                    Token::Space => Opcode::Dup,
                    Token::Tab => Opcode::Swap,
                    _ => Opcode::Pop,
                };
                self.emit(program, opcode);
                Ok(())
            }
            _ => Err(self.syntax(Family::Stack)),
        }
    }

    fn parse_arithmetic(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let opcode = match self.next()? {
            Token::Space => match self.next()? {
                Token::Space => Opcode::Add,
                Token::Tab => Opcode::Sub,
                _ => Opcode::Mul,
            },
            Token::Tab => match self.next()? {
                Token::Space => Opcode::Div,
                Token::Tab => Opcode::Mod,
                _ => return Err(self.syntax(Family::Arithmetic)),
            },
            _ => return Err(self.syntax(Family::Arithmetic)),
        };
        self.emit(program, opcode);
        Ok(())
    }

    fn parse_heap(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let opcode = match self.next()? {
            Token::Space => Opcode::Store,
            Token::Tab => Opcode::Load,
            _ => return Err(self.syntax(Family::Heap)),
        };
        self.emit(program, opcode);
        Ok(())
    }

    fn parse_flow_control(&mut self, program: &mut Program) -> Result<(), ParseError> {
        match self.next()? {
            Token::Space => {
                let opcode = match self.next()? {
                    Token::Space => Opcode::Mark,
                    Token::Tab => Opcode::Call,
                    _ => Opcode::Jump,
                };
                self.emit_with_literal(program, opcode)
            }
            Token::Tab => match self.next()? {
                Token::Space => self.emit_with_literal(program, Opcode::JumpIfZero),
                Token::Tab => self.emit_with_literal(program, Opcode::JumpIfNegative),
                _ => {
                    self.emit(program, Opcode::Return);
                    Ok(())
                }
            },
            _ => match self.next()? {
                Token::Linefeed => {
                    self.emit(program, Opcode::End);
                    Ok(())
                }
                _ => Err(self.syntax(Family::FlowControl)),
            },
        }
    }

    fn parse_io(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let opcode = match self.next()? {
            Token::Space => match self.next()? {
                Token::Space => Opcode::WriteChar,
                Token::Tab => Opcode::WriteNumber,
                _ => return Err(self.syntax(Family::Io)),
            },
            Token::Tab => match self.next()? {
                Token::Space => Opcode::ReadChar,
                Token::Tab => Opcode::ReadNumber,
                _ => return Err(self.syntax(Family::Io)),
            },
            _ => return Err(self.syntax(Family::Io)),
        };
        self.emit(program, opcode);
        Ok(())
    }
}

/// Tokenizes and parses a complete source.
pub fn parse_source(source: &[u8]) -> Result<Program, ParseError> {
    Parser::new(Tokenizer::new(source)).parse()
}
