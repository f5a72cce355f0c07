//! TCode to 8051 assembly compiler.
//!
//! [`compile`] is a pure function of the source text: each call builds its
//! own allocators and tables, so independent compiles may run concurrently.

pub mod backends;
pub mod config;
pub mod error;
pub mod include;
pub mod ir;
pub mod parser;
pub mod resources;
pub mod source;

pub use config::{CompileOptions, Interrupt};
pub use error::{CompileError, ErrorKind};

/// Compiles TCode source into assembly for `options.target`.
pub fn compile(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    let program = parser::parse(source)?;
    let mut backend = options.target.create(options);
    backend.compile(&program)
}
