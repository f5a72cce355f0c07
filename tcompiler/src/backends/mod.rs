pub mod i8051;
mod snippets;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::ir::ast;

pub trait Backend {
    fn compile(&mut self, program: &ast::Program) -> Result<String, CompileError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendType {
    #[default]
    I8051,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![Self::I8051]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::I8051 => "8051",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::I8051 => "Intel 8051 microcontroller (assembly text)",
        }
    }

    /// File extension of the generated output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::I8051 => "asm",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|b| b.name() == name)
    }

    pub fn create(&self, options: &CompileOptions) -> Box<dyn Backend> {
        match self {
            Self::I8051 => Box::new(i8051::I8051Backend::new(options.clone())),
        }
    }
}
