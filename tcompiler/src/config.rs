use std::collections::BTreeMap;

use crate::backends::BackendType;
use crate::error::CompileError;
use crate::ir::ast;

/// The 8051 interrupt sources a method can be attached to, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interrupt {
    External0,
    Timer0,
    External1,
    Timer1,
}

impl Interrupt {
    pub fn name(&self) -> &'static str {
        match self {
            Self::External0 => "ext0",
            Self::Timer0 => "timer0",
            Self::External1 => "ext1",
            Self::Timer1 => "timer1",
        }
    }

    /// Code address the CPU jumps to when the interrupt fires.
    pub fn vector(&self) -> u8 {
        match self {
            Self::External0 => 0x03,
            Self::Timer0 => 0x0B,
            Self::External1 => 0x13,
            Self::Timer1 => 0x1B,
        }
    }

    pub fn is_timer(&self) -> bool {
        matches!(self, Self::Timer0 | Self::Timer1)
    }
}

/// A method to run when an interrupt fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub method: String,
    /// Timers only: count external pulses instead of machine cycles.
    pub counter: bool,
}

/// A handler after its method has been looked up in the parsed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandler {
    pub interrupt: Interrupt,
    pub label: ast::Label,
    pub counter: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub target: BackendType,
    pub interrupts: BTreeMap<Interrupt, Handler>,
    /// Disable interrupts around every straight-line command.
    pub atomic: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, interrupt: Interrupt, method: impl Into<String>) -> Self {
        self.interrupts.insert(
            interrupt,
            Handler {
                method: method.into().to_lowercase(),
                counter: false,
            },
        );
        self
    }

    /// Switches a configured timer into counter mode.
    pub fn with_counter(mut self, interrupt: Interrupt) -> Self {
        if let Some(handler) = self.interrupts.get_mut(&interrupt) {
            handler.counter = interrupt.is_timer();
        }
        self
    }

    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Looks every handler up among the program's methods.
    ///
    /// Handlers run with no arguments, so their methods must not declare any.
    pub fn resolve_handlers(&self, program: &ast::Program) -> Result<Vec<ResolvedHandler>, CompileError> {
        self.interrupts
            .iter()
            .map(|(interrupt, handler)| {
                let method = program
                    .find_method(&handler.method)
                    .ok_or_else(|| CompileError::UnknownHandler {
                        name: handler.method.clone(),
                    })?;
                if !method.signature.is_empty() {
                    return Err(CompileError::HandlerParameters {
                        name: handler.method.clone(),
                    });
                }
                Ok(ResolvedHandler {
                    interrupt: *interrupt,
                    label: method.label.clone(),
                    counter: handler.counter,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn handlers_resolve_in_vector_order() {
        let program = parser::parse("method tick[]\nendmethod\nmethod button[]\nendmethod").expect("parse");
        let options = CompileOptions::new()
            .with_handler(Interrupt::Timer1, "tick")
            .with_handler(Interrupt::External0, "Button")
            .with_counter(Interrupt::Timer1);

        let handlers = options.resolve_handlers(&program).expect("resolve");
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].interrupt, Interrupt::External0);
        assert_eq!(handlers[0].label, ast::Label("M2".into()));
        assert_eq!(handlers[1].interrupt, Interrupt::Timer1);
        assert!(handlers[1].counter);
    }

    #[test]
    fn handlers_must_be_parameterless_methods() {
        let program = parser::parse("method blink[int n]\nendmethod").expect("parse");

        let unknown = CompileOptions::new().with_handler(Interrupt::Timer0, "nope");
        assert_eq!(
            unknown.resolve_handlers(&program),
            Err(CompileError::UnknownHandler { name: "nope".into() })
        );

        let with_parameters = CompileOptions::new().with_handler(Interrupt::Timer0, "blink");
        assert_eq!(
            with_parameters.resolve_handlers(&program),
            Err(CompileError::HandlerParameters { name: "blink".into() })
        );
    }

    #[test]
    fn counter_mode_only_applies_to_timers() {
        let options = CompileOptions::new()
            .with_handler(Interrupt::External1, "edge")
            .with_counter(Interrupt::External1);
        assert!(!options.interrupts[&Interrupt::External1].counter);
    }
}
