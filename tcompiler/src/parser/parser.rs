use log::{debug, trace};

use super::lexer::{self, CommandType};
use super::signatures;
use crate::error::{CompileError, ErrorKind};
use crate::ir::ast;
use crate::resources::Resources;
use crate::source::SourceLine;

/// The port registers, predeclared as `int` and never released.
pub const STANDARD_VARIABLES: [(&str, u8); 4] = [("p0", 0x80), ("p1", 0x90), ("p2", 0xA0), ("p3", 0xB0)];

pub fn parse_lines(
    lines: &[SourceLine],
    methods: Vec<ast::Method>,
    resources: Resources,
) -> Result<ast::Program, CompileError> {
    let parser = Parser::new(lines, methods, resources);
    parser.parse_program()
}

pub(super) fn error_at(line: &SourceLine, kind: ErrorKind) -> CompileError {
    CompileError::Source {
        line: line.index,
        text: line.raw.clone(),
        kind,
    }
}

/// Letters, digits and `_`, starting with a letter; never a keyword or
/// something shaped like a generated label.
pub(super) fn is_name_valid(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    if lexer::RESERVED.contains(&name) {
        return false;
    }
    let label_shaped = name.len() > 1
        && (name.starts_with('l') || name.starts_with('m'))
        && name[1..].bytes().all(|b| b.is_ascii_digit());
    !label_shaped
}

pub(super) struct Parser<'a> {
    lines: &'a [SourceLine],
    line: usize,
    pub(super) resources: Resources,
    /// Every variable currently in scope, innermost last.
    variables: Vec<ast::Variable>,
    scopes: Vec<ast::BlockId>,
    blocks: Vec<ast::Block>,
    pub(super) methods: Vec<ast::Method>,
    current_method: Option<ast::MethodId>,
}

impl<'a> Parser<'a> {
    fn new(lines: &'a [SourceLine], methods: Vec<ast::Method>, resources: Resources) -> Self {
        let variables = STANDARD_VARIABLES
            .iter()
            .map(|(name, address)| ast::Variable {
                name: name.to_string(),
                ty: ast::VarType::Int,
                address: ast::Address::Byte(*address),
            })
            .collect();

        Self {
            lines,
            line: 0,
            resources,
            variables,
            scopes: Vec::new(),
            blocks: Vec::new(),
            methods,
            current_method: None,
        }
    }

    fn parse_program(mut self) -> Result<ast::Program, CompileError> {
        let mut commands = Vec::with_capacity(self.lines.len());

        for index in 0..self.lines.len() {
            self.line = index;
            let command = self.parse_line()?;
            trace!("line {}: {:?}", index + 1, command);
            commands.push(command);
        }

        self.check_closed()?;

        Ok(ast::Program {
            commands,
            blocks: self.blocks,
            methods: self.methods,
        })
    }

    fn parse_line(&mut self) -> Result<ast::Command, CompileError> {
        let lines = self.lines;
        let code = lines[self.line].code.as_str();

        match lexer::classify(code) {
            CommandType::Int => self.parse_declaration(ast::VarType::Int, code),
            CommandType::Bool => self.parse_declaration(ast::VarType::Bool, code),
            CommandType::Char => self.parse_declaration(ast::VarType::Char, code),
            CommandType::Cint => self.parse_declaration(ast::VarType::Cint, code),
            CommandType::Block => {
                let block = self.open_block(ast::BlockKind::Plain);
                Ok(ast::Command::Block(block))
            }
            CommandType::IfBlock => {
                let condition = self.parse_condition(code)?;
                let block = self.open_block(ast::BlockKind::If { else_label: None });
                Ok(ast::Command::IfBlock { block, condition })
            }
            CommandType::ElseBlock => self.parse_else(),
            CommandType::WhileBlock => {
                let condition = self.parse_condition(code)?;
                let top = self.resources.next_label();
                let block = self.open_block(ast::BlockKind::While { top });
                Ok(ast::Command::WhileBlock { block, condition })
            }
            CommandType::ForTilBlock => {
                let text = self.keyword_argument(code, "fortil")?;
                let limit = self.resolve_expression(text)?;
                self.expect_byte(&limit, "the fortil limit")?;
                let register = self.resources.next_register().map_err(|kind| self.error(kind))?;
                let top = self.resources.next_label();
                let block = self.open_block(ast::BlockKind::ForTil { top, register });
                Ok(ast::Command::ForTilBlock { block, limit })
            }
            ty @ (CommandType::EndIf | CommandType::EndWhile | CommandType::EndForTil | CommandType::EndBlock) => {
                self.close_block(ty)
            }
            CommandType::Break => match self.scopes.last() {
                Some(&block) => Ok(ast::Command::Break(block)),
                None => self.fail(ErrorKind::InvalidSyntax("'break' outside of a block".to_string())),
            },
            CommandType::Method => self.open_method(code),
            CommandType::EndMethod => self.close_method(),
            CommandType::Return => {
                if self.current_method.is_none() {
                    return self.fail(ErrorKind::InvalidSyntax("'return' outside of a method".to_string()));
                }
                let rest = code["return".len()..].trim();
                let value = if rest.is_empty() {
                    None
                } else {
                    Some(self.resolve_expression(rest)?)
                };
                Ok(ast::Command::Return(value))
            }
            CommandType::Sleep => self.parse_sleep(code),
            ty if ty.is_assignment() => Ok(ast::Command::Assignment(self.parse_assignment(code, ty)?)),
            ty if ty.is_operator() => Ok(ast::Command::Operation(self.parse_operation(ty, code)?)),
            _ => self.parse_reference(code),
        }
    }

    fn parse_reference(&mut self, code: &str) -> Result<ast::Command, CompileError> {
        if code.is_empty() {
            return Ok(ast::Command::Empty);
        }
        match self.resolve_expression(code)? {
            ast::Expression::Operand(operand) => Ok(ast::Command::Reference(operand)),
            ast::Expression::Call(call) => Ok(ast::Command::MethodCall(call)),
            ast::Expression::Operation(operation) => Ok(ast::Command::Operation(*operation)),
        }
    }

    fn parse_declaration(&mut self, ty: ast::VarType, code: &str) -> Result<ast::Command, CompileError> {
        let rest = code[ty.keyword().len()..].trim();
        let assignment = lexer::classify(rest);
        let with_value = assignment.is_assignment();

        if !with_value && rest.split_whitespace().count() != 1 {
            return self.fail(ErrorKind::Parameter(format!(
                "expected '{} <name>' or '{} <name> := <value>'",
                ty.keyword(),
                ty.keyword()
            )));
        }

        let name = if with_value {
            let symbol = lexer::operator_symbol(assignment).unwrap_or(":=");
            let position = lexer::find_operator(rest, symbol).unwrap_or(rest.len());
            rest[..position].trim()
        } else {
            rest
        };

        let variable = self.declare_variable(name, ty)?;
        if let Some(&block) = self.scopes.last() {
            self.blocks[block.0].variables.push(variable);
        } else if let Some(method) = self.current_method {
            self.methods[method.0].variables.push(variable);
        }

        let init = if with_value {
            Some(self.parse_assignment(rest, assignment)?)
        } else {
            None
        };

        Ok(ast::Command::Declaration {
            name: name.to_string(),
            ty,
            init,
        })
    }

    /// Allocates storage for a new name and brings it into scope.
    fn declare_variable(&mut self, name: &str, ty: ast::VarType) -> Result<ast::Variable, CompileError> {
        if !is_name_valid(name) {
            return self.fail(ErrorKind::InvalidName(name.to_string()));
        }
        if self.lookup(name).is_some() || self.methods.iter().any(|m| m.name == name) {
            return self.fail(ErrorKind::VariableExists(name.to_string()));
        }

        let address = match ty.kind() {
            ast::Kind::Bit => self.resources.next_bit_address().map(ast::Address::Bit),
            ast::Kind::Byte => self.resources.next_byte_address().map(ast::Address::Byte),
        }
        .map_err(|kind| self.error(kind))?;

        let variable = ast::Variable {
            name: name.to_string(),
            ty,
            address,
        };
        debug!("{} {} at {}", ty.keyword(), name, address);
        self.variables.push(variable.clone());
        Ok(variable)
    }

    pub(super) fn lookup(&self, name: &str) -> Option<&ast::Variable> {
        self.variables.iter().rev().find(|v| v.name == name)
    }

    fn parse_condition(&mut self, code: &str) -> Result<ast::Expression, CompileError> {
        let Some((text, trailing)) = lexer::bracket_content(code) else {
            return self.fail(ErrorKind::InvalidSyntax("expected a condition in '[...]'".to_string()));
        };
        if !trailing.is_empty() {
            return self.fail(ErrorKind::InvalidSyntax(format!("unexpected '{}' after condition", trailing)));
        }
        let condition = self.resolve_expression(text)?;
        if condition.kind() == Some(ast::Kind::Byte) {
            return self.fail(ErrorKind::Parameter("a condition must be a bool".to_string()));
        }
        Ok(condition)
    }

    /// The argument after a keyword, written either bare or in brackets.
    fn keyword_argument<'c>(&self, code: &'c str, keyword: &str) -> Result<&'c str, CompileError> {
        let rest = code[keyword.len()..].trim();
        let argument = if rest.starts_with('[') {
            match lexer::bracket_content(rest) {
                Some((text, "")) => text,
                _ => return self.fail(ErrorKind::InvalidSyntax(format!("malformed '{}' argument", keyword))),
            }
        } else {
            rest
        };
        if argument.is_empty() {
            return self.fail(ErrorKind::InvalidSyntax(format!("'{}' needs an argument", keyword)));
        }
        Ok(argument)
    }

    fn parse_sleep(&mut self, code: &str) -> Result<ast::Command, CompileError> {
        let text = self.keyword_argument(code, "sleep")?;
        let duration = self.resolve_expression(text)?;
        self.expect_byte(&duration, "the sleep duration")?;

        let outer = self.resources.next_register().map_err(|kind| self.error(kind))?;
        let inner = self.resources.next_register().map_err(|kind| self.error(kind))?;
        let sleep = ast::Sleep {
            duration,
            outer,
            inner,
            outer_label: self.resources.next_label(),
            inner_label: self.resources.next_label(),
            end_label: self.resources.next_label(),
        };
        self.resources.release_register();
        self.resources.release_register();
        Ok(ast::Command::Sleep(sleep))
    }

    fn open_block(&mut self, kind: ast::BlockKind) -> ast::BlockId {
        let id = ast::BlockId(self.blocks.len());
        self.blocks.push(ast::Block {
            kind,
            variables: Vec::new(),
            end_label: None,
            line: self.line,
        });
        self.scopes.push(id);
        id
    }

    fn close_block(&mut self, ty: CommandType) -> Result<ast::Command, CompileError> {
        let keyword = lexer::first_token(&self.lines[self.line].code).to_string();
        let Some(&id) = self.scopes.last() else {
            return self.fail(ErrorKind::InvalidSyntax(format!("'{}' without an open block", keyword)));
        };

        let matches = matches!(
            (&self.blocks[id.0].kind, ty),
            (ast::BlockKind::If { .. } | ast::BlockKind::Else, CommandType::EndIf)
                | (ast::BlockKind::While { .. }, CommandType::EndWhile)
                | (ast::BlockKind::ForTil { .. }, CommandType::EndForTil)
                | (ast::BlockKind::Plain, CommandType::EndBlock)
        );
        if !matches {
            let opener = self.blocks[id.0].line + 1;
            return self.fail(ErrorKind::InvalidSyntax(format!(
                "'{}' does not close the block opened at line {}",
                keyword, opener
            )));
        }

        self.pop_scope();
        Ok(ast::Command::EndBlock(id))
    }

    /// Drops the innermost frame, returning its storage and giving it an end label.
    fn pop_scope(&mut self) -> Option<ast::BlockId> {
        let id = self.scopes.pop()?;
        let block = &mut self.blocks[id.0];

        for variable in block.variables.iter().rev() {
            release(&mut self.resources, variable.kind());
            self.variables.retain(|v| v.name != variable.name);
        }
        if let ast::BlockKind::ForTil { .. } = block.kind {
            self.resources.release_register();
        }
        if block.end_label.is_none() {
            block.end_label = Some(self.resources.next_label());
        }
        Some(id)
    }

    fn parse_else(&mut self) -> Result<ast::Command, CompileError> {
        let if_block = match self.scopes.last() {
            Some(&id) if matches!(self.blocks[id.0].kind, ast::BlockKind::If { else_label: None }) => id,
            _ => return self.fail(ErrorKind::ElseWithoutIf),
        };

        self.pop_scope();
        let else_label = self.resources.next_label();
        let end_label = self.blocks[if_block.0].end_label.clone();
        self.blocks[if_block.0].kind = ast::BlockKind::If {
            else_label: Some(else_label),
        };

        let block = self.open_block(ast::BlockKind::Else);
        self.blocks[block.0].end_label = end_label;
        Ok(ast::Command::Else { if_block, block })
    }

    fn open_method(&mut self, code: &str) -> Result<ast::Command, CompileError> {
        if self.current_method.is_some() || !self.scopes.is_empty() {
            return self.fail(ErrorKind::InvalidSyntax("methods cannot be nested".to_string()));
        }
        let name = signatures::split_signature(code).map(|(name, _)| name).unwrap_or_default();
        let Some(index) = self.methods.iter().position(|m| m.name == name) else {
            return self.fail(ErrorKind::InvalidName(name.to_string()));
        };

        let signature = self.methods[index].signature.clone();
        let mut parameters = Vec::with_capacity(signature.len());
        for parameter in &signature {
            parameters.push(self.declare_variable(&parameter.name, parameter.ty)?);
        }
        self.methods[index].parameters = parameters;

        debug!("entering method '{}'", name);
        let id = ast::MethodId(index);
        self.current_method = Some(id);
        Ok(ast::Command::Method(id))
    }

    fn close_method(&mut self) -> Result<ast::Command, CompileError> {
        let Some(id) = self.current_method else {
            return self.fail(ErrorKind::InvalidSyntax("'endmethod' without 'method'".to_string()));
        };
        if let Some(&open) = self.scopes.last() {
            let opener = self.blocks[open.0].line + 1;
            return self.fail(ErrorKind::InvalidSyntax(format!(
                "block opened at line {} is still open",
                opener
            )));
        }

        // The names go out of scope but the storage stays reserved: a call
        // from anywhere later still writes the parameters at these addresses.
        let method = &self.methods[id.0];
        for variable in method.variables.iter().chain(&method.parameters) {
            self.variables.retain(|v| v.name != variable.name);
        }
        debug!("leaving method '{}'", method.name);

        self.current_method = None;
        Ok(ast::Command::EndMethod(id))
    }

    fn check_closed(&mut self) -> Result<(), CompileError> {
        self.line = self.lines.len().saturating_sub(1);
        if let Some(&open) = self.scopes.last() {
            let opener = self.blocks[open.0].line + 1;
            return self.fail(ErrorKind::InvalidSyntax(format!(
                "block opened at line {} is never closed",
                opener
            )));
        }
        if let Some(id) = self.current_method {
            let name = self.methods[id.0].name.clone();
            return self.fail(ErrorKind::InvalidSyntax(format!("method '{}' is never closed", name)));
        }
        Ok(())
    }

    pub(super) fn expect_byte(&self, value: &ast::Expression, what: &str) -> Result<(), CompileError> {
        if value.kind() == Some(ast::Kind::Bit) {
            return self.fail(ErrorKind::Parameter(format!("{} must be a number", what)));
        }
        Ok(())
    }

    pub(super) fn error(&self, kind: ErrorKind) -> CompileError {
        error_at(&self.lines[self.line], kind)
    }

    pub(super) fn fail<T>(&self, kind: ErrorKind) -> Result<T, CompileError> {
        Err(self.error(kind))
    }
}

fn release(resources: &mut Resources, kind: ast::Kind) {
    match kind {
        ast::Kind::Bit => resources.release_bit(),
        ast::Kind::Byte => resources.release_byte(),
    }
}
