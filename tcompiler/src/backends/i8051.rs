use std::collections::HashMap;

use log::{debug, info};

use super::Backend;
use super::snippets::{self, hex};
use crate::config::{CompileOptions, ResolvedHandler};
use crate::error::CompileError;
use crate::ir::ast;
use crate::resources::Resources;

/// Emits 8051 assembly text.
///
/// Every value is computed into the accumulator: bytes fill `A`, bools
/// live in `acc.0`. `B` (0F0h) holds the right operand of a binary
/// operator whenever it cannot be addressed directly.
pub struct I8051Backend {
    options: CompileOptions,
}

impl Backend for I8051Backend {
    fn compile(&mut self, program: &ast::Program) -> Result<String, CompileError> {
        let handlers = self.options.resolve_handlers(program)?;
        let atomic = self.options.atomic && !handlers.is_empty();

        let mut generator = Generator::new(program, atomic);
        for command in &program.commands {
            generator.compile_command(command)?;
        }
        Ok(generator.finish(&handlers))
    }
}

impl I8051Backend {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }
}

fn backend_error(message: impl Into<String>) -> CompileError {
    CompileError::BackendError {
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Main,
    Subroutines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
}

impl From<ast::AssignOp> for Arith {
    fn from(op: ast::AssignOp) -> Self {
        match op {
            ast::AssignOp::Add | ast::AssignOp::Assign => Self::Add,
            ast::AssignOp::Subtract => Self::Subtract,
            ast::AssignOp::Multiply => Self::Multiply,
            ast::AssignOp::Divide => Self::Divide,
            ast::AssignOp::Modulo => Self::Modulo,
            ast::AssignOp::And => Self::And,
            ast::AssignOp::Or => Self::Or,
        }
    }
}

/// Commands that cannot jump, so interrupts can be masked around them.
fn is_straight_line(command: &ast::Command) -> bool {
    matches!(
        command,
        ast::Command::Declaration { init: Some(_), .. }
            | ast::Command::Assignment(_)
            | ast::Command::Operation(_)
            | ast::Command::Reference(_)
    )
}

/// A byte operand usable as the source of `add A, ...`, `mov dst, ...` etc.
fn direct(value: &ast::Expression) -> Option<String> {
    match value.as_operand()? {
        ast::Operand::Variable(v) if v.kind() == ast::Kind::Byte => Some(v.address.to_string()),
        ast::Operand::Constant(c) if c.kind() == ast::Kind::Byte => Some(format!("#{}", c.value)),
        _ => None,
    }
}

struct Generator<'p> {
    program: &'p ast::Program,
    atomic: bool,
    /// Replays the parser's allocations to place `data`/`bit` directives.
    resources: Resources,
    symbols: HashMap<String, usize>,
    /// Registers live across the code being emitted: open fortil counters
    /// and shift/bit counters waiting on their left operand.
    held: Vec<ast::Register>,
    section: Section,
    main: Vec<String>,
    subroutines: Vec<String>,
}

impl<'p> Generator<'p> {
    fn new(program: &'p ast::Program, atomic: bool) -> Self {
        Self {
            program,
            atomic,
            resources: Resources::new(),
            symbols: HashMap::new(),
            held: Vec::new(),
            section: Section::Main,
            main: Vec::new(),
            subroutines: Vec::new(),
        }
    }

    fn finish(self, handlers: &[ResolvedHandler]) -> String {
        let mut lines: Vec<String> = vec![snippets::HEADER.to_string(), "ljmp main".to_string()];
        lines.extend(snippets::vectors(handlers));
        lines.push("main:".to_string());
        lines.push(snippets::STACK_INIT.to_string());
        lines.extend(snippets::interrupt_setup(handlers));
        lines.extend(self.main);
        lines.push("jmp main".to_string());
        lines.extend(self.subroutines);
        for handler in handlers {
            lines.extend(snippets::interrupt_stub(handler));
        }
        lines.push(snippets::FOOTER.to_string());

        info!("generated {} line(s) of 8051 assembly", lines.len());
        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    fn emit(&mut self, line: impl Into<String>) {
        match self.section {
            Section::Main => self.main.push(line.into()),
            Section::Subroutines => self.subroutines.push(line.into()),
        }
    }

    fn mark(&mut self, label: &ast::Label) {
        self.emit(label.mark());
    }

    fn block(&self, id: ast::BlockId) -> &'p ast::Block {
        self.program.block(id)
    }

    fn end_label(&self, id: ast::BlockId) -> Result<&'p ast::Label, CompileError> {
        let block = self.block(id);
        block
            .end_label
            .as_ref()
            .ok_or_else(|| backend_error(format!("block opened at line {} was never closed", block.line + 1)))
    }

    fn compile_command(&mut self, command: &'p ast::Command) -> Result<(), CompileError> {
        let wrap = self.atomic && is_straight_line(command);
        if wrap {
            self.emit(snippets::BEFORE_COMMAND);
        }

        match command {
            ast::Command::Empty | ast::Command::Block(_) => {}
            ast::Command::IfBlock { block, condition } => {
                self.load(condition)?;
                let target = match &self.block(*block).kind {
                    ast::BlockKind::If { else_label: Some(label) } => label,
                    _ => self.end_label(*block)?,
                };
                self.emit(format!("jnb acc.0, {}", target));
            }
            ast::Command::Else { if_block, block } => {
                let end = self.end_label(*block)?;
                let ast::BlockKind::If { else_label: Some(else_label) } = &self.block(*if_block).kind else {
                    return Err(backend_error("else without a matching if"));
                };
                let closed = self.block(*if_block);
                self.emit(format!("jmp {}", end));
                self.release(&closed.variables);
                self.mark(else_label);
            }
            ast::Command::WhileBlock { block, condition } => {
                let ast::BlockKind::While { top } = &self.block(*block).kind else {
                    return Err(backend_error("while without a loop label"));
                };
                self.mark(top);
                self.load(condition)?;
                let end = self.end_label(*block)?;
                self.emit(format!("jnb acc.0, {}", end));
            }
            ast::Command::ForTilBlock { block, limit } => {
                let ast::BlockKind::ForTil { top, register } = &self.block(*block).kind else {
                    return Err(backend_error("fortil without a counter"));
                };
                self.load(limit)?;
                let end = self.end_label(*block)?;
                self.emit(format!("jz {}", end));
                self.emit(format!("mov {}, A", register));
                self.mark(top);
                self.held.push(*register);
            }
            ast::Command::EndBlock(id) => {
                let block = self.block(*id);
                match &block.kind {
                    ast::BlockKind::While { top } => self.emit(format!("jmp {}", top)),
                    ast::BlockKind::ForTil { top, register } => {
                        self.emit(format!("djnz {}, {}", register, top));
                        self.held.pop();
                    }
                    _ => {}
                }
                let end = self.end_label(*id)?;
                self.mark(end);
                self.release(&block.variables);
            }
            ast::Command::Break(id) => {
                let end = self.end_label(*id)?;
                self.emit(format!("jmp {}", end));
            }
            ast::Command::Method(id) => {
                let program = self.program;
                let method = program.method(*id);
                debug!("emitting method '{}' as {}", method.name, method.label);
                self.section = Section::Subroutines;
                self.mark(&method.label);
                for parameter in &method.parameters {
                    self.declare(&parameter.name, parameter.ty)?;
                }
            }
            ast::Command::EndMethod(id) => {
                let program = self.program;
                let method = program.method(*id);
                self.emit("ret");
                self.section = Section::Main;
            }
            ast::Command::Return(value) => {
                if let Some(value) = value {
                    self.load(value)?;
                }
                self.emit("ret");
            }
            ast::Command::MethodCall(call) => self.call(call)?,
            ast::Command::Sleep(sleep) => self.sleep(sleep)?,
            ast::Command::Declaration { name, ty, init } => {
                self.declare(name, *ty)?;
                if let Some(assignment) = init {
                    self.assign(assignment)?;
                }
            }
            ast::Command::Operation(operation) => self.operation(operation)?,
            ast::Command::Assignment(assignment) => self.assign(assignment)?,
            ast::Command::Reference(operand) => self.load_operand(operand),
        }

        if wrap {
            self.emit(snippets::AFTER_COMMAND);
        }
        Ok(())
    }

    /// Allocates the next address for `name` and emits its directive.
    fn declare(&mut self, name: &str, ty: ast::VarType) -> Result<(), CompileError> {
        let count = self.symbols.entry(name.to_string()).or_insert(0);
        *count += 1;
        let symbol = if *count == 1 {
            name.to_string()
        } else {
            format!("{}_{}", name, count)
        };

        let directive = match ty.kind() {
            ast::Kind::Byte => {
                let address = self
                    .resources
                    .next_byte_address()
                    .map_err(|kind| backend_error(kind.to_string()))?;
                format!("{} data {}", symbol, hex(address))
            }
            ast::Kind::Bit => {
                let address = self
                    .resources
                    .next_bit_address()
                    .map_err(|kind| backend_error(kind.to_string()))?;
                format!("{} bit {}", symbol, address)
            }
        };
        self.emit(directive);
        Ok(())
    }

    fn release(&mut self, variables: &[ast::Variable]) {
        for variable in variables {
            match variable.kind() {
                ast::Kind::Bit => self.resources.release_bit(),
                ast::Kind::Byte => self.resources.release_byte(),
            }
        }
    }

    fn load(&mut self, value: &ast::Expression) -> Result<(), CompileError> {
        match value {
            ast::Expression::Operand(operand) => {
                self.load_operand(operand);
                Ok(())
            }
            ast::Expression::Call(call) => self.call(call),
            ast::Expression::Operation(operation) => self.operation(operation),
        }
    }

    fn load_operand(&mut self, operand: &ast::Operand) {
        match operand {
            ast::Operand::Variable(variable) => match variable.address {
                ast::Address::Byte(_) => self.emit(format!("mov A, {}", variable.address)),
                ast::Address::Bit(bit) => {
                    self.emit(format!("mov C, {}", bit));
                    self.emit("mov acc.0, C");
                }
            },
            ast::Operand::Constant(constant) => self.emit(format!("mov A, #{}", constant.value)),
        }
    }

    /// Writes the accumulator to a variable.
    fn store(&mut self, address: ast::Address) {
        match address {
            ast::Address::Byte(_) => self.emit(format!("mov {}, A", address)),
            ast::Address::Bit(bit) => {
                self.emit("mov C, acc.0");
                self.emit(format!("mov {}, C", bit));
            }
        }
    }

    fn store_value(&mut self, address: ast::Address, value: &ast::Expression) -> Result<(), CompileError> {
        if let ast::Address::Byte(_) = address {
            if let Some(source) = direct(value) {
                self.emit(format!("mov {}, {}", address, source));
                return Ok(());
            }
        }
        if let (ast::Address::Bit(bit), Some(ast::Operand::Constant(constant))) = (address, value.as_operand()) {
            let instruction = if constant.value != 0 { "setb" } else { "clr" };
            self.emit(format!("{} {}", instruction, bit));
            return Ok(());
        }
        self.load(value)?;
        self.store(address);
        Ok(())
    }

    fn assign(&mut self, assignment: &ast::Assignment) -> Result<(), CompileError> {
        match &assignment.target {
            ast::Target::Variable(variable) if assignment.op == ast::AssignOp::Assign => {
                self.store_value(variable.address, &assignment.value)
            }
            ast::Target::Variable(variable) => {
                let current = ast::Expression::Operand(ast::Operand::Variable(variable.clone()));
                self.arithmetic(assignment.op.into(), &current, &assignment.value)?;
                self.store(variable.address);
                Ok(())
            }
            ast::Target::BitOf { variable, bit } => {
                let addressable = variable.address.is_bit_addressable();
                if let (true, Some(ast::Operand::Constant(constant))) = (addressable, assignment.value.as_operand()) {
                    let instruction = if constant.value != 0 { "setb" } else { "clr" };
                    self.emit(format!("{} {}.{}", instruction, variable.address, bit));
                    return Ok(());
                }

                self.load(&assignment.value)?;
                self.emit("mov C, acc.0");
                if addressable {
                    self.emit(format!("mov {}.{}, C", variable.address, bit));
                } else {
                    self.emit(format!("mov A, {}", variable.address));
                    self.emit(format!("mov acc.{}, C", bit));
                    self.emit(format!("mov {}, A", variable.address));
                }
                Ok(())
            }
        }
    }

    fn call(&mut self, call: &ast::MethodCall) -> Result<(), CompileError> {
        let program = self.program;
        let method = program.method(call.method);
        if method.parameters.len() != call.arguments.len() {
            return Err(backend_error(format!(
                "call to '{}' does not match its parameters",
                method.name
            )));
        }
        for (argument, parameter) in call.arguments.iter().zip(&method.parameters) {
            self.store_value(parameter.address, argument)?;
        }

        // methods allocate registers from R0 again, so live ones are saved
        let saved = self.held.clone();
        for register in &saved {
            self.emit(format!("push {}", register.direct()));
        }
        self.emit(format!("call {}", method.label));
        for register in saved.iter().rev() {
            self.emit(format!("pop {}", register.direct()));
        }
        Ok(())
    }

    fn sleep(&mut self, sleep: &ast::Sleep) -> Result<(), CompileError> {
        self.load(&sleep.duration)?;
        self.emit(format!("jz {}", sleep.end_label));
        self.emit(format!("mov {}, A", sleep.outer));
        self.mark(&sleep.outer_label);
        // 250 * 4 cycles, about a millisecond at 12 MHz
        self.emit(format!("mov {}, #250", sleep.inner));
        self.mark(&sleep.inner_label);
        self.emit("nop");
        self.emit("nop");
        self.emit(format!("djnz {}, {}", sleep.inner, sleep.inner_label));
        self.emit(format!("djnz {}, {}", sleep.outer, sleep.outer_label));
        self.mark(&sleep.end_label);
        Ok(())
    }

    /// Evaluates `right` then `left`, leaving `left` in A and `right` in B.
    fn through_b(&mut self, left: &ast::Expression, right: &ast::Expression) -> Result<String, CompileError> {
        self.load(right)?;
        self.emit("push acc");
        self.load(left)?;
        self.emit("pop 0F0h");
        Ok("0F0h".to_string())
    }

    /// Leaves `left` in A and returns the operand naming `right`.
    fn binary(&mut self, left: &ast::Expression, right: &ast::Expression) -> Result<String, CompileError> {
        match direct(right) {
            Some(source) => {
                self.load(left)?;
                Ok(source)
            }
            None => self.through_b(left, right),
        }
    }

    fn arithmetic(&mut self, op: Arith, left: &ast::Expression, right: &ast::Expression) -> Result<(), CompileError> {
        let source = self.binary(left, right)?;
        match op {
            Arith::Add => self.emit(format!("add A, {}", source)),
            Arith::Subtract => {
                self.emit("clr C");
                self.emit(format!("subb A, {}", source));
            }
            Arith::And => self.emit(format!("anl A, {}", source)),
            Arith::Or => self.emit(format!("orl A, {}", source)),
            Arith::Multiply | Arith::Divide | Arith::Modulo => {
                if source != "0F0h" {
                    self.emit(format!("mov 0F0h, {}", source));
                }
                if op == Arith::Multiply {
                    self.emit("mul AB");
                } else {
                    self.emit("div AB");
                }
                if op == Arith::Modulo {
                    self.emit("mov A, 0F0h");
                }
            }
        }
        Ok(())
    }

    fn carry_to_acc(&mut self) {
        for line in snippets::CARRY_TO_ACC {
            self.emit(line);
        }
    }

    fn compare(&mut self, operands: &ast::Operands, bigger: bool) -> Result<(), CompileError> {
        let signed = operands.left.is_signed() || operands.right.is_signed();
        let source = if signed {
            let source = self.through_b(&operands.left, &operands.right)?;
            self.emit("xrl A, #080h");
            self.emit("xrl 0F0h, #080h");
            source
        } else {
            self.binary(&operands.left, &operands.right)?
        };

        if bigger {
            // A - B - 1 borrows exactly when A <= B
            self.emit("setb C");
            self.emit(format!("subb A, {}", source));
            self.emit("cpl C");
        } else {
            self.emit("clr C");
            self.emit(format!("subb A, {}", source));
        }
        self.carry_to_acc();
        Ok(())
    }

    fn equality(&mut self, operands: &ast::Operands, equal: bool) -> Result<(), CompileError> {
        let bits = operands.left.kind().or(operands.right.kind()) == Some(ast::Kind::Bit);
        let source = self.binary(&operands.left, &operands.right)?;
        self.emit(format!("xrl A, {}", source));
        if bits {
            self.emit("anl A, #1");
        }
        // carry is set for any non-zero difference
        self.emit("add A, #0FFh");
        if equal {
            self.emit("cpl C");
        }
        self.carry_to_acc();
        Ok(())
    }

    fn shift(&mut self, shift: &ast::Shift, left: bool) -> Result<(), CompileError> {
        let register = shift.register;
        self.load(&shift.operands.right)?;
        self.emit(format!("mov {}, A", register));
        self.held.push(register);
        self.load(&shift.operands.left)?;
        self.held.pop();
        self.emit(format!("inc {}", register));
        self.emit(format!("jmp {}", shift.check_label));
        self.mark(&shift.loop_label);
        if left {
            self.emit("clr C");
            self.emit("rlc A");
        } else {
            if shift.operands.left.is_signed() {
                self.emit("mov C, acc.7");
            } else {
                self.emit("clr C");
            }
            self.emit("rrc A");
        }
        self.mark(&shift.check_label);
        self.emit(format!("djnz {}, {}", register, shift.loop_label));
        Ok(())
    }

    fn bit_of(&mut self, bit_of: &ast::BitOf) -> Result<(), CompileError> {
        match &bit_of.bit {
            ast::BitIndex::Constant(bit) => {
                match bit_of.value.as_operand() {
                    Some(ast::Operand::Variable(variable)) if variable.address.is_bit_addressable() => {
                        self.emit(format!("mov C, {}.{}", variable.address, bit));
                    }
                    _ => {
                        self.load(&bit_of.value)?;
                        self.emit(format!("mov C, acc.{}", bit));
                    }
                }
                self.carry_to_acc();
            }
            ast::BitIndex::Dynamic {
                index,
                register,
                loop_label,
                check_label,
            } => {
                self.load(index)?;
                self.emit(format!("mov {}, A", register));
                self.held.push(*register);
                self.load(&bit_of.value)?;
                self.held.pop();
                self.emit(format!("inc {}", register));
                self.emit(format!("jmp {}", check_label));
                self.mark(loop_label);
                self.emit("rr A");
                self.mark(check_label);
                self.emit(format!("djnz {}, {}", register, loop_label));
                self.emit("anl A, #1");
            }
        }
        Ok(())
    }

    fn operation(&mut self, operation: &ast::Operation) -> Result<(), CompileError> {
        match operation {
            ast::Operation::And(ops) => self.arithmetic(Arith::And, &ops.left, &ops.right),
            ast::Operation::Or(ops) => self.arithmetic(Arith::Or, &ops.left, &ops.right),
            ast::Operation::Add(ops) => self.arithmetic(Arith::Add, &ops.left, &ops.right),
            ast::Operation::Subtract(ops) => self.arithmetic(Arith::Subtract, &ops.left, &ops.right),
            ast::Operation::Multiply(ops) => self.arithmetic(Arith::Multiply, &ops.left, &ops.right),
            ast::Operation::Divide(ops) => self.arithmetic(Arith::Divide, &ops.left, &ops.right),
            ast::Operation::Modulo(ops) => self.arithmetic(Arith::Modulo, &ops.left, &ops.right),
            ast::Operation::Not(value) => {
                self.load(value)?;
                if value.kind() == Some(ast::Kind::Bit) {
                    self.emit("cpl acc.0");
                } else {
                    self.emit("cpl A");
                }
                Ok(())
            }
            ast::Operation::Increment(variable) => {
                self.emit(format!("inc {}", variable.address));
                self.emit(format!("mov A, {}", variable.address));
                Ok(())
            }
            ast::Operation::Decrement(variable) => {
                self.emit(format!("dec {}", variable.address));
                self.emit(format!("mov A, {}", variable.address));
                Ok(())
            }
            ast::Operation::ShiftLeft(shift) => self.shift(shift, true),
            ast::Operation::ShiftRight(shift) => self.shift(shift, false),
            ast::Operation::BitOf(bit_of) => self.bit_of(bit_of),
            ast::Operation::Bigger(ops) => self.compare(ops, true),
            ast::Operation::Smaller(ops) => self.compare(ops, false),
            ast::Operation::Equal(ops) => self.equality(ops, true),
            ast::Operation::UnEqual(ops) => self.equality(ops, false),
        }
    }
}
