//! Compile-scoped allocators for RAM, bit memory, work registers and labels.
//!
//! A fresh [`Resources`] is built for every compilation; acquiring and
//! releasing is strictly stack-like, matching how scopes open and close.

use crate::error::ErrorKind;
use crate::ir::ast::{BitAddress, Label, Register};

/// First byte handed out from general RAM.
pub const BYTE_START: u8 = 0x30;
/// One past the last usable byte of general RAM.
pub const BYTE_END: u8 = 0x80;
/// First byte of the bit-addressable region.
pub const BIT_START: u8 = 0x20;
/// One past the last byte of the bit-addressable region.
pub const BIT_END: u8 = 0x30;
pub const REGISTER_COUNT: u8 = 8;

const BIT_CAPACITY: usize = (BIT_END - BIT_START) as usize * 8;

#[derive(Debug, Clone, Default)]
pub struct Resources {
    bytes: usize,
    bits: usize,
    registers: u8,
    labels: usize,
    method_labels: usize,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_byte_address(&mut self) -> Result<u8, ErrorKind> {
        let address = BYTE_START as usize + self.bytes;
        if address >= BYTE_END as usize {
            return Err(ErrorKind::TooManyValues);
        }
        self.bytes += 1;
        Ok(address as u8)
    }

    pub fn release_byte(&mut self) {
        debug_assert!(self.bytes > 0, "released more bytes than allocated");
        self.bytes = self.bytes.saturating_sub(1);
    }

    pub fn next_bit_address(&mut self) -> Result<BitAddress, ErrorKind> {
        if self.bits >= BIT_CAPACITY {
            return Err(ErrorKind::TooManyBools);
        }
        let address = BitAddress {
            byte: BIT_START + (self.bits / 8) as u8,
            bit: (self.bits % 8) as u8,
        };
        self.bits += 1;
        Ok(address)
    }

    pub fn release_bit(&mut self) {
        debug_assert!(self.bits > 0, "released more bits than allocated");
        self.bits = self.bits.saturating_sub(1);
    }

    pub fn next_register(&mut self) -> Result<Register, ErrorKind> {
        if self.registers >= REGISTER_COUNT {
            return Err(ErrorKind::TooManyRegisters);
        }
        let register = Register(self.registers);
        self.registers += 1;
        Ok(register)
    }

    pub fn release_register(&mut self) {
        debug_assert!(self.registers > 0, "released more registers than allocated");
        self.registers = self.registers.saturating_sub(1);
    }

    pub fn next_label(&mut self) -> Label {
        self.labels += 1;
        Label(format!("l{}", self.labels))
    }

    pub fn next_method_label(&mut self) -> Label {
        self.method_labels += 1;
        Label(format!("M{}", self.method_labels))
    }
}
