//! Fixed pieces of 8051 assembly shared by the generator.

use crate::config::{Interrupt, ResolvedHandler};
use crate::ir::ast::Register;

pub const HEADER: &str = "include reg8051.inc";
pub const FOOTER: &str = "end";
/// Stack pointer (081h) at its reset value, so pushes grow through register
/// banks 1 to 3 (08h..1Fh) and stay clear of the allocated bit and byte regions.
pub const STACK_INIT: &str = "mov 081h, #07h";

/// Clears / sets EA (IE.7) around a command that must not be interrupted.
pub const BEFORE_COMMAND: &str = "clr 0A8h.7";
pub const AFTER_COMMAND: &str = "setb 0A8h.7";

/// Moves the carry into bit 0 of an otherwise cleared accumulator.
pub const CARRY_TO_ACC: [&str; 2] = ["clr A", "mov acc.0, C"];

pub fn stub_label(interrupt: Interrupt) -> String {
    format!("isr_{}", interrupt.name())
}

pub fn hex(value: u8) -> String {
    format!("0{:02X}h", value)
}

/// Vector table entries followed by the start of regular code.
pub fn vectors(handlers: &[ResolvedHandler]) -> Vec<String> {
    let mut lines = Vec::new();
    for handler in handlers {
        lines.push(format!("org {}", hex(handler.interrupt.vector())));
        lines.push(format!("ljmp {}", stub_label(handler.interrupt)));
    }
    if !lines.is_empty() {
        lines.push("org 030h".to_string());
    }
    lines
}

/// Trigger mode, TMOD and IE setup for the configured interrupts.
pub fn interrupt_setup(handlers: &[ResolvedHandler]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    if handlers.is_empty() {
        return lines;
    }
    let mut push = |line: &str| lines.push(line.to_string());

    if handlers.iter().any(|h| h.interrupt.is_timer()) {
        push("mov 089h, #0");
    }
    for handler in handlers {
        match handler.interrupt {
            Interrupt::External0 => {
                push("setb 088h.0");
                push("clr 088h.1");
                push("setb 0A8h.0");
            }
            Interrupt::External1 => {
                push("setb 088h.2");
                push("clr 088h.3");
                push("setb 0A8h.2");
            }
            Interrupt::Timer0 => {
                push(if handler.counter { "orl 089h, #00000101b" } else { "orl 089h, #00000001b" });
                push("setb 088h.4");
                push("clr 088h.5");
                push("setb 0A8h.1");
            }
            Interrupt::Timer1 => {
                push(if handler.counter { "orl 089h, #01010000b" } else { "orl 089h, #00010000b" });
                push("setb 088h.6");
                push("clr 088h.7");
                push("setb 0A8h.3");
            }
        }
    }
    push(AFTER_COMMAND);
    lines
}

/// Saves the registers a handler may touch, calls it and returns from the interrupt.
///
/// Bank 0 (R0..R7) is saved whole: the handler allocates its counters from R0
/// while the interrupted code may be inside a loop on the same registers.
pub fn interrupt_stub(handler: &ResolvedHandler) -> Vec<String> {
    let registers: Vec<String> = (0..8).map(|n| Register(n).direct()).collect();

    let mut lines = vec![format!("{}:", stub_label(handler.interrupt))];
    lines.extend(["push acc", "push psw", "push 0F0h"].map(String::from));
    lines.extend(registers.iter().map(|r| format!("push {}", r)));
    lines.push(format!("call {}", handler.label));
    lines.extend(registers.iter().rev().map(|r| format!("pop {}", r)));
    lines.extend(["pop 0F0h", "pop psw", "pop acc", "reti"].map(String::from));
    lines
}
