//! Single-pass bytecode generation with jump backpatching.
//!
//! Walks the syntax tree once, appending instructions to a flat buffer and
//! literals to the constants pool. Branch targets that are unknown while a
//! construct is still open are emitted as zero placeholders and rewritten in
//! place once the target position is known.

use thiserror::Error;

use crate::ast::{Expression, Program, Statement, StatementsBlock};
use crate::bytecode::{ByteCode, Op, make_instruction};
use crate::object::Object;
use crate::symbols::SymbolTable;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),
    #[error("cannot assign new value to undeclared variable `{0}`")]
    UndeclaredAssignment(String),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("function declarations are not supported by the bytecode compiler")]
    FunctionDeclarationsUnsupported,
    #[error("function calls are not supported by the bytecode compiler")]
    FunctionCallsUnsupported,
    #[error("return outside of a function is not supported")]
    ReturnOutsideFunction,
    #[error("too many globals, cannot define `{0}`")]
    TooManyGlobals(String),
    #[error("too many constants in program")]
    TooManyConstants,
}

#[derive(Default)]
pub struct Compiler {
    instructions: Vec<u8>,
    constants: Vec<Object>,
    symbols: SymbolTable,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_program(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    pub fn bytecode(self) -> ByteCode {
        ByteCode {
            instructions: self.instructions,
            constants: self.constants,
        }
    }

    fn compile_block(&mut self, block: &StatementsBlock) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Declaration { name, value, .. } => {
                self.compile_expression(value)?;
                let symbol = self
                    .symbols
                    .define(&name.name)
                    .ok_or_else(|| CompileError::TooManyGlobals(name.name.clone()))?;
                self.emit(Op::GlobalSet, &[symbol.index]);
            }
            Statement::Assignment { name, value, .. } => {
                self.compile_expression(value)?;
                match self.symbols.resolve(&name.name) {
                    Some(symbol) => {
                        let index = symbol.index;
                        self.emit(Op::GlobalSet, &[index]);
                    }
                    None => {
                        return Err(CompileError::UndeclaredAssignment(name.name.clone()));
                    }
                }
            }
            Statement::If {
                conditions,
                consequences,
                alternative,
                ..
            } => {
                let mut block_end_jumps = Vec::new();
                let last_arm = consequences.len().saturating_sub(1);
                for (i, (condition, consequence)) in
                    conditions.iter().zip(consequences).enumerate()
                {
                    self.compile_expression(condition)?;
                    let jnt_position = self.emit(Op::Jnt, &[0]);

                    self.compile_block(consequence)?;
                    if alternative.is_some() || i != last_arm {
                        block_end_jumps.push(self.emit(Op::Jump, &[0]));
                    }

                    let post_consequence = self.instructions.len() as u16;
                    self.change_operand(jnt_position, post_consequence);
                }
                if let Some(alternative) = alternative {
                    self.compile_block(alternative)?;
                }
                let post_if = self.instructions.len() as u16;
                for position in block_end_jumps {
                    self.change_operand(position, post_if);
                }
            }
            Statement::Loop {
                condition, body, ..
            } => {
                let pre_condition = self.instructions.len() as u16;
                self.compile_expression(condition)?;
                let jnt_position = self.emit(Op::Jnt, &[0]);

                self.compile_block(body)?;
                self.emit(Op::Jump, &[pre_condition]);

                let post_block = self.instructions.len() as u16;
                self.change_operand(jnt_position, post_block);
            }
            Statement::Input { name, .. } => match self.symbols.resolve(&name.name) {
                Some(symbol) => {
                    let index = symbol.index;
                    self.emit(Op::In, &[index]);
                }
                None => return Err(CompileError::UndefinedSymbol(name.name.clone())),
            },
            // A trailing expression value stays on the stack; no POP. The
            // runtime tolerates residuals and `Vm::stack_top` observes them.
            Statement::Expression { expression, .. } => {
                self.compile_expression(expression)?;
            }
            Statement::FunctionDeclaration { .. } => {
                return Err(CompileError::FunctionDeclarationsUnsupported);
            }
            Statement::Return { .. } => return Err(CompileError::ReturnOutsideFunction),
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Identifier(identifier) => match self.symbols.resolve(&identifier.name) {
                Some(symbol) => {
                    let index = symbol.index;
                    self.emit(Op::GlobalGet, &[index]);
                }
                None => return Err(CompileError::UndefinedSymbol(identifier.name.clone())),
            },
            Expression::UnsignedIntegerLiteral { value, .. } => {
                let index = self.register_constant(Object::UnsignedInteger(*value))?;
                self.emit(Op::Const, &[index]);
            }
            Expression::BooleanLiteral { value, .. } => {
                if *value {
                    self.emit(Op::True, &[]);
                } else {
                    self.emit(Op::False, &[]);
                }
            }
            Expression::Prefix {
                operator, right, ..
            } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(Op::Bang, &[]),
                    "-" => self.emit(Op::Minus, &[]),
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
            }
            Expression::Infix {
                operator,
                left,
                right,
                ..
            } => {
                // `<` and `<=` reuse GT/GEQ with swapped operands.
                if operator == "<" || operator == "<=" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    if operator == "<" {
                        self.emit(Op::Gt, &[]);
                    } else {
                        self.emit(Op::Geq, &[]);
                    }
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(Op::Add, &[]),
                    "-" => self.emit(Op::Sub, &[]),
                    "*" => self.emit(Op::Mul, &[]),
                    "/" => self.emit(Op::Div, &[]),
                    "==" => self.emit(Op::Eq, &[]),
                    "!=" => self.emit(Op::Neq, &[]),
                    ">" => self.emit(Op::Gt, &[]),
                    ">=" => self.emit(Op::Geq, &[]),
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
            }
            Expression::Call { .. } => return Err(CompileError::FunctionCallsUnsupported),
        }
        Ok(())
    }

    fn register_constant(&mut self, constant: Object) -> Result<u16, CompileError> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(constant);
        Ok((self.constants.len() - 1) as u16)
    }

    fn emit(&mut self, op: Op, operands: &[u16]) -> usize {
        let instruction = make_instruction(op, operands);
        let position = self.instructions.len();
        self.instructions.extend(instruction);
        position
    }

    /// Rewrites the 2-byte operand of the instruction at `position`, leaving
    /// the opcode byte untouched.
    fn change_operand(&mut self, position: usize, operand: u16) {
        let bytes = operand.to_be_bytes();
        self.instructions[position + 1] = bytes[0];
        self.instructions[position + 2] = bytes[1];
    }
}
