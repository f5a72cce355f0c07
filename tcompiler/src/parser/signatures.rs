//! First pass: every `method name[params]` line is registered before any
//! body is parsed, so calls may appear above the method they call.

use log::debug;

use super::lexer::{self, CommandType};
use super::parser::{STANDARD_VARIABLES, error_at, is_name_valid};
use crate::error::{CompileError, ErrorKind};
use crate::ir::ast::{Method, Parameter, VarType};
use crate::resources::Resources;
use crate::source::SourceLine;

pub(super) fn collect(lines: &[SourceLine], resources: &mut Resources) -> Result<Vec<Method>, CompileError> {
    let mut methods: Vec<Method> = Vec::new();

    for line in lines {
        if lexer::classify(&line.code) != CommandType::Method {
            continue;
        }

        let (name, parameters) =
            split_signature(&line.code).ok_or_else(|| error_at(line, ErrorKind::InvalidSyntax(
                "expected 'method name[parameters]'".to_string(),
            )))?;

        if !is_name_valid(name) || methods.iter().any(|m| m.name == name) {
            return Err(error_at(line, ErrorKind::InvalidName(name.to_string())));
        }

        let mut signature: Vec<Parameter> = Vec::new();
        for text in lexer::split_arguments(parameters) {
            let parameter = parse_parameter(text).ok_or_else(|| {
                error_at(line, ErrorKind::Parameter(format!("invalid parameter '{}'", text)))
            })?;
            if !is_name_valid(&parameter.name) {
                return Err(error_at(line, ErrorKind::InvalidName(parameter.name)));
            }
            let taken = signature.iter().any(|p| p.name == parameter.name)
                || STANDARD_VARIABLES.iter().any(|(name, _)| *name == parameter.name);
            if taken {
                return Err(error_at(line, ErrorKind::VariableExists(parameter.name)));
            }
            signature.push(parameter);
        }

        let label = resources.next_method_label();
        debug!("method '{}' -> {} ({} parameter(s))", name, label, signature.len());
        methods.push(Method {
            name: name.to_string(),
            label,
            signature,
            parameters: Vec::new(),
            variables: Vec::new(),
            line: line.index,
        });
    }

    Ok(methods)
}

/// `method blink[int times, bool fast]` -> (`blink`, `int times, bool fast`)
pub(super) fn split_signature(code: &str) -> Option<(&str, &str)> {
    let rest = code.strip_prefix("method")?;
    let (parameters, trailing) = lexer::bracket_content(rest)?;
    if !trailing.is_empty() {
        return None;
    }
    let name = rest[..rest.find('[')?].trim();
    Some((name, parameters))
}

fn parse_parameter(text: &str) -> Option<Parameter> {
    let mut words = text.split_whitespace();
    let ty = VarType::from_keyword(words.next()?)?;
    let name = words.next()?;
    if words.next().is_some() {
        return None;
    }
    Some(Parameter {
        name: name.to_string(),
        ty,
    })
}
