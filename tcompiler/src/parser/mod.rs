pub mod lexer;
pub mod parser;

mod expr;
mod signatures;
#[cfg(test)]
mod tests;

use log::debug;

use crate::error::CompileError;
use crate::ir::ast;
use crate::resources::Resources;
use crate::source;

/// Parses TCode into a [`ast::Program`].
///
/// Runs signature collection over every line first so that calls may
/// precede the method body, then builds the command list.
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    let lines = source::split_lines(source);
    let mut resources = Resources::new();

    let methods = signatures::collect(&lines, &mut resources)?;
    debug!("collected {} method signature(s)", methods.len());

    let program = parser::parse_lines(&lines, methods, resources)?;
    debug!(
        "parsed {} line(s) into {} block(s)",
        program.commands.len(),
        program.blocks.len()
    );
    Ok(program)
}
