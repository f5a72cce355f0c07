//! Expressions, literals and assignments.
//!
//! A value is resolved in a fixed order: method call, live variable,
//! literal, then an operator split at the last top-level occurrence of the
//! classified symbol. Each side of an operator is resolved recursively.

use super::lexer::{self, CommandType};
use super::parser::Parser;
use crate::error::{CompileError, ErrorKind};
use crate::ir::ast;

impl Parser<'_> {
    pub(super) fn resolve_expression(&mut self, text: &str) -> Result<ast::Expression, CompileError> {
        let text = text.trim();
        if text.is_empty() {
            return self.fail(ErrorKind::Parameter("missing value".to_string()));
        }

        if let Some(call) = self.resolve_call(text)? {
            return Ok(ast::Expression::Call(call));
        }
        if let Some(variable) = self.lookup(text) {
            return Ok(ast::Expression::Operand(ast::Operand::Variable(variable.clone())));
        }
        if let Some(constant) = parse_literal(text).map_err(|kind| self.error(kind))? {
            return Ok(ast::Expression::Operand(ast::Operand::Constant(constant)));
        }

        match lexer::classify(text) {
            ty if ty.is_operator() => {
                let operation = self.parse_operation(ty, text)?;
                Ok(ast::Expression::Operation(Box::new(operation)))
            }
            ty if ty.is_assignment() => {
                self.fail(ErrorKind::Parameter("an assignment has no value".to_string()))
            }
            _ => self.fail(ErrorKind::InvalidName(text.to_string())),
        }
    }

    /// `name[arg, ...]` where `name` is a known method. Anything following
    /// the closing bracket means this is not a call but an operation on one.
    fn resolve_call(&mut self, text: &str) -> Result<Option<ast::MethodCall>, CompileError> {
        let name = lexer::first_token(text);
        let Some(index) = self.methods.iter().position(|m| m.name == name) else {
            return Ok(None);
        };
        let arguments = match lexer::bracket_content(text) {
            Some((list, "")) => lexer::split_arguments(list),
            Some(_) => return Ok(None),
            None => {
                return self.fail(ErrorKind::InvalidSyntax(format!("'{}' must be called as {}[...]", name, name)));
            }
        };

        let signature = self.methods[index].signature.clone();
        if arguments.len() != signature.len() {
            return self.fail(ErrorKind::Parameter(format!(
                "'{}' takes {} parameter(s), got {}",
                name,
                signature.len(),
                arguments.len()
            )));
        }

        let mut values = Vec::with_capacity(arguments.len());
        for (text, parameter) in arguments.into_iter().zip(&signature) {
            let value = self.resolve_expression(text)?;
            if value.kind().is_some_and(|kind| kind != parameter.ty.kind()) {
                return self.fail(ErrorKind::Parameter(format!(
                    "'{}' expects {} for '{}'",
                    name,
                    parameter.ty.keyword(),
                    parameter.name
                )));
            }
            self.check_fits(parameter.ty, &value)?;
            values.push(value);
        }

        Ok(Some(ast::MethodCall {
            method: ast::MethodId(index),
            arguments: values,
        }))
    }

    pub(super) fn parse_assignment(&mut self, text: &str, ty: CommandType) -> Result<ast::Assignment, CompileError> {
        let op = match ty {
            CommandType::AddAssignment => ast::AssignOp::Add,
            CommandType::SubtractAssignment => ast::AssignOp::Subtract,
            CommandType::MultiplyAssignment => ast::AssignOp::Multiply,
            CommandType::DivideAssignment => ast::AssignOp::Divide,
            CommandType::ModuloAssignment => ast::AssignOp::Modulo,
            CommandType::AndAssignment => ast::AssignOp::And,
            CommandType::OrAssignment => ast::AssignOp::Or,
            _ => ast::AssignOp::Assign,
        };
        let symbol = op.symbol();
        let Some(position) = lexer::find_operator(text, symbol) else {
            return self.fail(ErrorKind::InvalidCommand);
        };
        let left = text[..position].trim();
        let right = text[position + symbol.len()..].trim();
        if left.is_empty() || right.is_empty() {
            return self.fail(ErrorKind::Parameter(format!("'{}' needs a target and a value", symbol)));
        }

        let target = self.resolve_target(left, op)?;
        let value = self.resolve_expression(right)?;

        let arithmetic = !matches!(op, ast::AssignOp::Assign | ast::AssignOp::And | ast::AssignOp::Or);
        if arithmetic && target.kind() != ast::Kind::Byte {
            return self.fail(ErrorKind::Parameter(format!("'{}' needs a number on the left", symbol)));
        }
        if value.kind().is_some_and(|kind| kind != target.kind()) {
            return self.fail(ErrorKind::Parameter(format!(
                "cannot assign a {} value to a {} target",
                value.kind().map(|k| k.to_string()).unwrap_or_default(),
                target.kind()
            )));
        }
        if let ast::Target::Variable(variable) = &target {
            self.check_fits(variable.ty, &value)?;
        }

        Ok(ast::Assignment { target, op, value })
    }

    fn resolve_target(&mut self, text: &str, op: ast::AssignOp) -> Result<ast::Target, CompileError> {
        if let Some(variable) = self.lookup(text) {
            return Ok(ast::Target::Variable(variable.clone()));
        }

        let Some(position) = lexer::find_operator(text, ".") else {
            return self.fail(ErrorKind::InvalidName(text.to_string()));
        };
        let name = text[..position].trim();
        let bit = text[position + 1..].trim();

        let Some(variable) = self.lookup(name).cloned() else {
            return self.fail(ErrorKind::InvalidName(name.to_string()));
        };
        if variable.kind() != ast::Kind::Byte {
            return self.fail(ErrorKind::Parameter(format!("'{}' has no bits to select", name)));
        }
        let bit = match bit.parse::<u8>() {
            Ok(bit) if bit < 8 => bit,
            _ => return self.fail(ErrorKind::InvalidValue(bit.to_string())),
        };
        if op != ast::AssignOp::Assign {
            return self.fail(ErrorKind::Parameter(format!(
                "'{}' cannot target a single bit",
                op.symbol()
            )));
        }
        Ok(ast::Target::BitOf { variable, bit })
    }

    pub(super) fn parse_operation(&mut self, ty: CommandType, text: &str) -> Result<ast::Operation, CompileError> {
        let Some(symbol) = lexer::operator_symbol(ty) else {
            return self.fail(ErrorKind::InvalidCommand);
        };
        let Some(position) = lexer::find_operator(text, symbol) else {
            return self.fail(ErrorKind::InvalidCommand);
        };
        let left = text[..position].trim();
        let right = text[position + symbol.len()..].trim();

        match ty {
            CommandType::Increment | CommandType::Decrement => {
                let variable = self.counter_variable(left, right, symbol)?;
                Ok(if ty == CommandType::Increment {
                    ast::Operation::Increment(variable)
                } else {
                    ast::Operation::Decrement(variable)
                })
            }
            CommandType::Not => {
                if !left.is_empty() {
                    return self.fail(ErrorKind::Parameter("'!' takes a single value on its right".to_string()));
                }
                Ok(ast::Operation::Not(self.resolve_expression(right)?))
            }
            CommandType::ShiftLeft | CommandType::ShiftRight => {
                let register = self.resources.next_register().map_err(|kind| self.error(kind))?;
                let operands = self.resolve_operands(left, right, symbol)?;
                self.expect_numbers(&operands, symbol)?;
                let shift = ast::Shift {
                    operands,
                    register,
                    loop_label: self.resources.next_label(),
                    check_label: self.resources.next_label(),
                };
                self.resources.release_register();
                Ok(if ty == CommandType::ShiftLeft {
                    ast::Operation::ShiftLeft(shift)
                } else {
                    ast::Operation::ShiftRight(shift)
                })
            }
            CommandType::BitOf => self.parse_bit_of(left, right).map(ast::Operation::BitOf),
            CommandType::And | CommandType::Or | CommandType::Equal | CommandType::UnEqual => {
                let operands = self.resolve_operands(left, right, symbol)?;
                if let (Some(l), Some(r)) = (operands.left.kind(), operands.right.kind()) {
                    if l != r {
                        return self.fail(ErrorKind::Parameter(format!(
                            "'{}' cannot combine a {} with a {}",
                            symbol, l, r
                        )));
                    }
                }
                Ok(match ty {
                    CommandType::And => ast::Operation::And(operands),
                    CommandType::Or => ast::Operation::Or(operands),
                    CommandType::Equal => ast::Operation::Equal(operands),
                    _ => ast::Operation::UnEqual(operands),
                })
            }
            _ => {
                let operands = self.resolve_operands(left, right, symbol)?;
                self.expect_numbers(&operands, symbol)?;
                Ok(match ty {
                    CommandType::Add => ast::Operation::Add(operands),
                    CommandType::Subtract => ast::Operation::Subtract(operands),
                    CommandType::Multiply => ast::Operation::Multiply(operands),
                    CommandType::Divide => ast::Operation::Divide(operands),
                    CommandType::Modulo => ast::Operation::Modulo(operands),
                    CommandType::Bigger => ast::Operation::Bigger(operands),
                    CommandType::Smaller => ast::Operation::Smaller(operands),
                    _ => return self.fail(ErrorKind::InvalidCommand),
                })
            }
        }
    }

    /// `x++` and `++x` both name a byte variable on exactly one side.
    fn counter_variable(&self, left: &str, right: &str, symbol: &str) -> Result<ast::Variable, CompileError> {
        let name = match (left.is_empty(), right.is_empty()) {
            (false, true) => left,
            (true, false) => right,
            _ => {
                return self.fail(ErrorKind::Parameter(format!("'{}' takes exactly one variable", symbol)));
            }
        };
        let Some(variable) = self.lookup(name) else {
            return self.fail(ErrorKind::InvalidName(name.to_string()));
        };
        if variable.kind() != ast::Kind::Byte {
            return self.fail(ErrorKind::Parameter(format!("'{}' needs a number variable", symbol)));
        }
        Ok(variable.clone())
    }

    fn parse_bit_of(&mut self, left: &str, right: &str) -> Result<ast::BitOf, CompileError> {
        if left.is_empty() || right.is_empty() {
            return self.fail(ErrorKind::Parameter("'.' needs a value and a bit".to_string()));
        }

        if let Some(constant) = parse_literal(right).map_err(|kind| self.error(kind))? {
            if constant.kind() != ast::Kind::Byte || constant.ty == ast::VarType::Cint || constant.value > 7 {
                return self.fail(ErrorKind::InvalidValue(right.to_string()));
            }
            let value = self.resolve_expression(left)?;
            self.expect_byte(&value, "a bit selection")?;
            return Ok(ast::BitOf {
                value,
                bit: ast::BitIndex::Constant(constant.value),
            });
        }

        let register = self.resources.next_register().map_err(|kind| self.error(kind))?;
        let value = self.resolve_expression(left)?;
        self.expect_byte(&value, "a bit selection")?;
        let index = self.resolve_expression(right)?;
        self.expect_byte(&index, "a bit index")?;
        let bit = ast::BitIndex::Dynamic {
            index,
            register,
            loop_label: self.resources.next_label(),
            check_label: self.resources.next_label(),
        };
        self.resources.release_register();
        Ok(ast::BitOf { value, bit })
    }

    fn resolve_operands(&mut self, left: &str, right: &str, symbol: &str) -> Result<ast::Operands, CompileError> {
        if left.is_empty() || right.is_empty() {
            return self.fail(ErrorKind::Parameter(format!("'{}' needs a value on both sides", symbol)));
        }
        let left = self.resolve_expression(left)?;
        let right = self.resolve_expression(right)?;
        Ok(ast::Operands { left, right })
    }

    fn expect_numbers(&self, operands: &ast::Operands, symbol: &str) -> Result<(), CompileError> {
        let what = format!("each side of '{}'", symbol);
        self.expect_byte(&operands.left, &what)?;
        self.expect_byte(&operands.right, &what)
    }

    /// Rejects literals that do not fit the type they are stored into.
    fn check_fits(&self, ty: ast::VarType, value: &ast::Expression) -> Result<(), CompileError> {
        let Some(ast::Operand::Constant(constant)) = value.as_operand() else {
            return Ok(());
        };
        let fits = match (ty, constant.ty) {
            (ast::VarType::Cint, ast::VarType::Int | ast::VarType::Char) => constant.value <= 127,
            (ast::VarType::Int | ast::VarType::Char, ast::VarType::Cint) => constant.value == 0,
            _ => true,
        };
        if fits {
            Ok(())
        } else {
            let shown = match constant.ty {
                ast::VarType::Cint => (constant.value as i8).to_string(),
                _ => constant.value.to_string(),
            };
            self.fail(ErrorKind::InvalidValue(shown))
        }
    }
}

/// `true`/`false`, `0`..`255`, `0x00`..`0xff`, `-128`..`-1` and `'c'`.
/// `Ok(None)` means the text is not shaped like a literal at all.
pub(super) fn parse_literal(text: &str) -> Result<Option<ast::Constant>, ErrorKind> {
    type Literal = Result<Option<ast::Constant>, ErrorKind>;
    let constant = |ty: ast::VarType, value: u8| -> Literal { Ok(Some(ast::Constant { ty, value })) };
    let invalid = || -> Literal { Err(ErrorKind::InvalidValue(text.to_string())) };

    match text {
        "true" => return constant(ast::VarType::Bool, 1),
        "false" => return constant(ast::VarType::Bool, 0),
        _ => {}
    }

    if let Some(hex) = text.strip_prefix("0x") {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(None);
        }
        return match u32::from_str_radix(hex, 16) {
            Ok(value) if value <= 0xFF => constant(ast::VarType::Int, value as u8),
            _ => invalid(),
        };
    }

    if is_digits(text) {
        return match text.parse::<u32>() {
            Ok(value) if value <= 0xFF => constant(ast::VarType::Int, value as u8),
            _ => invalid(),
        };
    }

    // the sign may stand apart from its digits: `- 3`
    if let Some(digits) = text.strip_prefix('-').map(str::trim_start) {
        if is_digits(digits) {
            return match digits.parse::<i32>().map(|magnitude| -magnitude) {
                Ok(value) if (-128..=0).contains(&value) => constant(ast::VarType::Cint, value as i8 as u8),
                _ => invalid(),
            };
        }
        return Ok(None);
    }

    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let mut chars = text[1..text.len() - 1].chars();
        return match (chars.next(), chars.next()) {
            (Some(ch), None) if (ch as u32) <= 0xFF => constant(ast::VarType::Char, ch as u8),
            _ => invalid(),
        };
    }

    Ok(None)
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}
